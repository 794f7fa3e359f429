//! Colored console output for audit runs.

use crate::report::{AuditReport, ReportEntry};
use crate::types::{AuditOutcome, AuditStatus};
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::path::Path;

/// Console output handler with colors and formatting.
pub struct ConsoleOutput {
    verbose: bool,
    json_mode: bool,
}

impl ConsoleOutput {
    /// Create a new console output handler.
    pub fn new(verbose: bool, json_mode: bool) -> Self {
        Self { verbose, json_mode }
    }

    /// Print the run parameters.
    pub fn print_run_header(&self, lock_file: &Path, registry_url: &str, workers: usize) {
        if self.json_mode {
            return;
        }

        println!("PNPM Lock File: {}", lock_file.display().to_string().bright_white());
        println!("Registry Base URL: {}", registry_url.bright_white());
        println!("Number of Workers: {}", workers);
    }

    /// Print a pipeline step header.
    pub fn print_step(&self, step: usize, title: &str) {
        if self.json_mode {
            return;
        }

        println!();
        println!("{}", format!("=== Step {}: {} ===", step, title).bright_cyan());
    }

    /// Print progress detail (only in verbose mode).
    pub fn print_progress(&self, message: &str) {
        if self.json_mode || !self.verbose {
            return;
        }

        println!("{} {}", "[.]".dimmed(), message.dimmed());
    }

    /// Print info message.
    pub fn print_info(&self, message: &str) {
        if self.json_mode {
            return;
        }

        println!("{} {}", "[*]".bright_blue(), message);
    }

    /// Create a `completed/total` progress bar on stdout.
    pub fn create_progress_bar(&self, total: u64) -> Option<ProgressBar> {
        if self.json_mode {
            return None;
        }

        let pb = ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::stdout());
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.cyan} Progress: {pos}/{len} packages checked [{bar:40.cyan/blue}] {elapsed}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        Some(pb)
    }

    /// Record `completed` of `total` outcomes. Falls back to a plain line
    /// when the bar cannot draw (stdout is not a terminal).
    pub fn advance_progress(&self, pb: Option<&ProgressBar>, completed: usize, total: usize) {
        let Some(pb) = pb else {
            return;
        };

        pb.set_position(completed as u64);
        if pb.is_hidden() {
            println!("{}", progress_line(completed, total));
        }
    }

    /// Print every entry in report order.
    pub fn print_report(&self, report: &AuditReport) {
        if self.json_mode {
            return;
        }

        println!();
        for entry in &report.entries {
            let line = entry_line(entry, report.total);
            println!("{}", colorize(entry.outcome.status, line));
        }
    }

    /// Print audit summary.
    pub fn print_summary(&self, report: &AuditReport) {
        if self.json_mode {
            return;
        }

        println!();
        println!("{}", "=== Audit Complete ===".bright_cyan());
        println!(
            "  Processed {} dependencies from {}",
            report.total,
            report.lock_file.display()
        );
        println!("  Registry:  {}", report.registry_url);

        for status in AuditStatus::ALL {
            let count = report.count(status);
            if count > 0 {
                println!(
                    "  {:<17} {}",
                    format!("{}:", status.label()),
                    colorize(status, count.to_string())
                );
            }
        }

        if report.unavailable() > 0 {
            println!(
                "  {}",
                format!("{} dependencies are not available", report.unavailable())
                    .red()
                    .bold()
            );
        } else {
            println!("  {}", "All dependencies are available.".green());
        }

        println!("  Dependency tree saved to: {}", report.tree_path.display());
        println!("  Total time: {:.2}s", report.duration_secs);
        println!();
    }
}

impl Default for ConsoleOutput {
    fn default() -> Self {
        Self::new(false, false)
    }
}

/// Human-readable status for an outcome.
pub fn status_text(outcome: &AuditOutcome) -> String {
    match outcome.status {
        AuditStatus::Available => "Available in registry".to_string(),
        AuditStatus::Blocked => "Blocked (403 Forbidden)".to_string(),
        AuditStatus::NotFound => "Not Found (404)".to_string(),
        AuditStatus::Unexpected => match outcome.status_code {
            Some(code) => format!("Unexpected Response: {}", code),
            None => "Unexpected Response".to_string(),
        },
        AuditStatus::RequestFailed => "Request Failed".to_string(),
        AuditStatus::InvalidIdentity => "Invalid scoped package format".to_string(),
    }
}

/// Plain progress line used when no bar is drawn.
pub fn progress_line(completed: usize, total: usize) -> String {
    format!("Progress: {}/{} packages checked", completed, total)
}

/// One report line: `[i/N] name@version (type) status[ - Error: cause]`.
pub fn entry_line(entry: &ReportEntry, total: usize) -> String {
    let outcome = &entry.outcome;
    let mut line = format!(
        "[{}/{}] {}@{} ({}) {}",
        entry.position + 1,
        total,
        outcome.name,
        outcome.version,
        outcome.origin,
        status_text(outcome)
    );
    if let Some(ref error) = outcome.error {
        line.push_str(&format!(" - Error: {}", error));
    }
    line
}

fn colorize(status: AuditStatus, text: String) -> ColoredString {
    match status {
        AuditStatus::Available => text.green(),
        AuditStatus::Unexpected => text.yellow(),
        AuditStatus::Blocked
        | AuditStatus::NotFound
        | AuditStatus::RequestFailed
        | AuditStatus::InvalidIdentity => text.red(),
    }
}
