//! Command-line configuration.

use crate::types::HttpConfig;
use clap::Parser;
use std::path::PathBuf;

/// Curation audit for pnpm lock files.
///
/// Parses the lock file, saves the dependency tree beside it, then checks
/// every package version against the registry.
#[derive(Parser, Debug, Clone)]
#[command(name = "curaudit")]
#[command(author, version, about, long_about = None)]
#[command(after_help = "Example: curaudit pnpm-lock.yaml https://registry.npmjs.org \"$MY_ACCESS_TOKEN\" 10")]
pub struct Config {
    /// Path to the pnpm-lock.yaml file to audit
    pub lock_file: PathBuf,

    /// Registry base URL (e.g. https://registry.npmjs.org)
    pub registry_url: String,

    /// Bearer token sent to the registry (empty for none)
    pub access_token: Option<String>,

    /// Number of concurrent workers; invalid values fall back to 5
    #[arg(allow_hyphen_values = true)]
    pub workers: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Print the final report as JSON
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to this file
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Request timeout in seconds
    #[arg(long, default_value = "30")]
    pub timeout: u64,
}

impl Config {
    /// Get HTTP configuration for registry probes.
    pub fn http_config(&self) -> HttpConfig {
        HttpConfig {
            timeout_secs: self.timeout,
            ..HttpConfig::default()
        }
    }

    /// The access token, if a non-empty one was given.
    pub fn access_token(&self) -> Option<String> {
        self.access_token.clone().filter(|t| !t.is_empty())
    }
}
