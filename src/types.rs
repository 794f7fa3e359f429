//! Core types and errors for the curation audit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort an audit run.
///
/// Per-package problems never show up here; they are recorded as an
/// [`AuditStatus`] on the package's [`AuditOutcome`].
#[derive(Error, Debug)]
pub enum AuditError {
    #[error("pnpm-lock.yaml not found at path: {}", path.display())]
    LockfileNotFound { path: PathBuf },

    #[error("error reading {}: {source}", path.display())]
    LockfileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error parsing {}: {message}", path.display())]
    LockfileDecode { path: PathBuf, message: String },

    #[error("error serializing JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("error writing {}: {source}", path.display())]
    TreeWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error reading {}: {source}", path.display())]
    TreeRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("error writing report to {}: {source}", path.display())]
    ReportWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, AuditError>;

/// Opaque key-value metadata copied through from the lock file.
pub type Metadata = BTreeMap<String, serde_json::Value>;

/// Whether a dependency was declared as a lock entry or only seen as a
/// `(name@version)` note inside another entry's version.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Origin {
    #[serde(rename = "package")]
    Declared,
    #[serde(rename = "indirect")]
    Indirect,
}

impl Origin {
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Declared => "package",
            Origin::Indirect => "indirect",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single package in the dependency tree, keyed by name in [`DependencyTree`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PackageRecord {
    /// Resolved version as written in the lock file.
    pub version: String,
    /// Declared entry or indirect note.
    #[serde(rename = "type")]
    pub origin: Origin,
    /// The entry's `resolution` mapping, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolution: Option<Metadata>,
    /// The entry's `engines` mapping, verbatim.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engines: Option<Metadata>,
}

impl PackageRecord {
    pub fn declared(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            origin: Origin::Declared,
            resolution: None,
            engines: None,
        }
    }

    pub fn indirect(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            origin: Origin::Indirect,
            resolution: None,
            engines: None,
        }
    }
}

/// Normalized view of a lock file: one record per unique package name.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DependencyTree {
    pub packages: BTreeMap<String, PackageRecord>,
}

impl DependencyTree {
    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }
}

/// One package/version queued for a registry probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditWorkItem {
    pub name: String,
    pub version: String,
    pub origin: Origin,
    /// 0-based rank in the enumerated (name-sorted) work list.
    pub position: usize,
}

/// Classification of a single registry probe.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AuditStatus {
    /// 200: tarball is retrievable.
    Available,
    /// 403: the registry refuses to serve it (curation block).
    Blocked,
    /// 404: the version is missing.
    NotFound,
    /// Any other HTTP status.
    Unexpected,
    /// No response was received.
    RequestFailed,
    /// Scoped name without a `/`; nothing was requested.
    InvalidIdentity,
}

impl AuditStatus {
    pub const ALL: [AuditStatus; 6] = [
        AuditStatus::Available,
        AuditStatus::Blocked,
        AuditStatus::NotFound,
        AuditStatus::Unexpected,
        AuditStatus::RequestFailed,
        AuditStatus::InvalidIdentity,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AuditStatus::Available => "Available",
            AuditStatus::Blocked => "Blocked",
            AuditStatus::NotFound => "Not found",
            AuditStatus::Unexpected => "Unexpected",
            AuditStatus::RequestFailed => "Request failed",
            AuditStatus::InvalidIdentity => "Invalid identity",
        }
    }
}

/// Result of probing one [`AuditWorkItem`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AuditOutcome {
    pub name: String,
    pub version: String,
    #[serde(rename = "type")]
    pub origin: Origin,
    pub status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl AuditOutcome {
    /// Outcome for a response that came back with `code`.
    pub fn from_response(item: &AuditWorkItem, status: AuditStatus, code: u16) -> Self {
        Self {
            name: item.name.clone(),
            version: item.version.clone(),
            origin: item.origin,
            status,
            status_code: Some(code),
            error: None,
        }
    }

    /// Outcome for a probe that never got a response.
    pub fn failed(item: &AuditWorkItem, status: AuditStatus, error: impl Into<String>) -> Self {
        Self {
            name: item.name.clone(),
            version: item.version.clone(),
            origin: item.origin,
            status,
            status_code: None,
            error: Some(error.into()),
        }
    }
}

/// Configuration for HTTP requests.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "curaudit/0.1".to_string(),
        }
    }
}
