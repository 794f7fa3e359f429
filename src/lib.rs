//! curaudit - Curation audit for pnpm lock files.
//!
//! This library checks that every package pinned in a lock file can actually
//! be fetched from a given registry:
//! - Parsing `pnpm-lock.yaml` into a normalized dependency tree
//! - Saving that tree as `pnpm_dependency_tree.json` beside the lock file
//! - Probing each package tarball with a bounded pool of workers
//! - Reporting every outcome in a stable, name-sorted order
//!
//! # Example
//!
//! ```no_run
//! use clap::Parser;
//! use curaudit::{Auditor, Config};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = Config::parse_from(["curaudit", "pnpm-lock.yaml", "https://registry.npmjs.org"]);
//!     let report = Auditor::new(&config).unwrap().run().await.unwrap();
//!     println!("{} of {} packages unavailable", report.unavailable(), report.total);
//! }
//! ```

pub mod auditor;
pub mod config;
pub mod parser;
pub mod registry;
pub mod report;
pub mod tree;
pub mod types;

pub use auditor::{audit_concurrently, resolve_worker_count, Auditor, DEFAULT_WORKERS};
pub use config::Config;
pub use report::{AuditReport, ReportEntry};
pub use types::{
    AuditError, AuditOutcome, AuditStatus, AuditWorkItem, DependencyTree, Origin, PackageRecord,
    Result,
};
