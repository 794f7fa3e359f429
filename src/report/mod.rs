//! Audit report model and output.
//!
//! This module handles:
//! - The ordered per-package report
//! - Colored console output and progress
//! - JSON report files

pub mod console;

pub use console::ConsoleOutput;

use crate::types::{AuditError, AuditOutcome, AuditStatus, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// An outcome placed at its work-list position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportEntry {
    /// 0-based position in the enumerated work list.
    pub position: usize,
    #[serde(flatten)]
    pub outcome: AuditOutcome,
}

/// Complete result of one audit run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// Lock file that was audited.
    pub lock_file: PathBuf,
    /// Registry the packages were probed against.
    pub registry_url: String,
    /// Where the dependency tree snapshot was written.
    pub tree_path: PathBuf,
    /// Number of work items submitted.
    pub total: usize,
    /// Outcomes in ascending position order.
    pub entries: Vec<ReportEntry>,
    /// Audit duration in seconds.
    pub duration_secs: f64,
}

impl AuditReport {
    /// Number of entries with the given status.
    pub fn count(&self, status: AuditStatus) -> usize {
        self.entries
            .iter()
            .filter(|e| e.outcome.status == status)
            .count()
    }

    /// Entries whose package could not be confirmed as available.
    pub fn unavailable(&self) -> usize {
        self.entries.len() - self.count(AuditStatus::Available)
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json).map_err(|source| AuditError::ReportWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
