//! curaudit - Curation audit for pnpm lock files.
//!
//! CLI entry point.

use clap::Parser;
use curaudit::{Auditor, Config};
use std::process::ExitCode;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let config = match Config::try_parse() {
        Ok(config) => config,
        Err(e) if e.use_stderr() => {
            // Usage problems go to stdout together with the usage text.
            println!("{}", e.render());
            return ExitCode::FAILURE;
        }
        Err(e) => {
            let _ = e.print();
            return ExitCode::SUCCESS;
        }
    };

    // Set up logging
    let filter = if config.verbose {
        EnvFilter::new("curaudit=debug,info")
    } else {
        EnvFilter::new("curaudit=info,warn")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run_audit(&config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(code) => code,
    }
}

async fn run_audit(config: &Config) -> Result<(), ExitCode> {
    let auditor = match Auditor::new(config) {
        Ok(a) => a,
        Err(e) => {
            error!("Failed to create auditor: {}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    let report = match auditor.run().await {
        Ok(r) => r,
        Err(e) => {
            error!("{}", e);
            return Err(ExitCode::FAILURE);
        }
    };

    if config.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{}", json),
            Err(e) => {
                error!("Failed to serialize report: {}", e);
                return Err(ExitCode::FAILURE);
            }
        }
    }

    if let Some(ref output_path) = config.output {
        if let Err(e) = report.write_json(output_path) {
            error!("{}", e);
            return Err(ExitCode::FAILURE);
        }
        info!("Report written to: {}", output_path.display());
    }

    Ok(())
}
