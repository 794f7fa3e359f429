//! Parser for pnpm `pnpm-lock.yaml` files.
//!
//! Lock keys conflate name and version (`abbrev@1.1.1`,
//! `@cypress/listr-verbose-renderer@0.4.1`), so the key itself is split
//! here rather than relying on any field inside the entry.

use crate::types::{AuditError, DependencyTree, Metadata, PackageRecord, Result};
use regex::Regex;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, trace};

/// Parser turning a pnpm lock document into a [`DependencyTree`].
#[derive(Clone)]
pub struct PnpmLockParser {
    /// `(name@version` notes embedded in a resolved version, e.g.
    /// `1.0.0(react@18.2.0)` or `2.1.0(@types/node@18.0.0)`. The version
    /// stops at the next parenthesis so nested notes match too.
    indirect_pattern: Regex,
}

impl PnpmLockParser {
    pub fn new() -> Self {
        Self {
            indirect_pattern: Regex::new(r"\((@?[^@()]+)@([^()]+)").unwrap(),
        }
    }

    /// Parse the lock file at `path`.
    pub fn parse_file(&self, path: &Path) -> Result<DependencyTree> {
        if !path.exists() {
            return Err(AuditError::LockfileNotFound {
                path: path.to_path_buf(),
            });
        }

        let bytes = fs::read(path).map_err(|source| AuditError::LockfileRead {
            path: path.to_path_buf(),
            source,
        })?;

        let decode_error = |message: String| AuditError::LockfileDecode {
            path: path.to_path_buf(),
            message,
        };

        let contents = String::from_utf8(bytes).map_err(|e| decode_error(e.to_string()))?;
        self.parse_str(&contents).map_err(decode_error)
    }

    /// Parse lock file contents. The error is a decode message without a path;
    /// [`parse_file`](Self::parse_file) attaches one.
    pub(crate) fn parse_str(&self, contents: &str) -> std::result::Result<DependencyTree, String> {
        if contents.trim().is_empty() {
            return Ok(DependencyTree::default());
        }

        let document: Value = serde_yaml::from_str(contents).map_err(|e| e.to_string())?;

        let entries = match &document {
            Value::Null => return Ok(DependencyTree::default()),
            Value::Mapping(root) => match root.get("packages") {
                None | Some(Value::Null) => return Ok(DependencyTree::default()),
                Some(Value::Mapping(entries)) => entries,
                Some(_) => return Err("`packages` is not a mapping".to_string()),
            },
            _ => return Err("lock file is not a mapping".to_string()),
        };

        let mut packages = self.declared_packages(entries);
        self.add_indirect_packages(&mut packages);

        debug!("Parsed {} packages from lock file", packages.len());
        Ok(DependencyTree { packages })
    }

    /// One declared record per parseable key, in document order. A later key
    /// producing an already-seen name replaces the earlier record.
    fn declared_packages(&self, entries: &Mapping) -> BTreeMap<String, PackageRecord> {
        let mut packages = BTreeMap::new();

        for (key, entry) in entries {
            let Some(key) = key.as_str() else {
                debug!("Skipping non-string lock key: {:?}", key);
                continue;
            };

            let Some((name, version)) = parse_package_key(key) else {
                debug!("Skipping unparseable lock key: {}", key);
                continue;
            };

            let mut record = PackageRecord::declared(version);
            if let Value::Mapping(fields) = entry {
                record.resolution = fields.get("resolution").and_then(metadata_from);
                record.engines = fields.get("engines").and_then(metadata_from);
            }

            if packages.insert(name.clone(), record).is_some() {
                trace!("Lock key {} replaces an earlier entry for {}", key, name);
            }
        }

        packages
    }

    /// Add indirect records for `(name@version)` notes. Names that already
    /// have a record keep it.
    fn add_indirect_packages(&self, packages: &mut BTreeMap<String, PackageRecord>) {
        let indirect: Vec<(String, String)> = packages
            .values()
            .flat_map(|record| self.extract_indirect_dependencies(&record.version))
            .collect();

        for (name, version) in indirect {
            if packages.contains_key(&name) {
                continue;
            }
            trace!("Recording indirect dependency {}@{}", name, version);
            packages.insert(name, PackageRecord::indirect(version));
        }
    }

    /// Every `(name@version)` note in a version string, in order of appearance.
    pub fn extract_indirect_dependencies(&self, version: &str) -> Vec<(String, String)> {
        self.indirect_pattern
            .captures_iter(version)
            .filter_map(|caps| {
                let name = caps.get(1)?.as_str();
                let version = caps.get(2)?.as_str();
                Some((name.to_string(), version.to_string()))
            })
            .collect()
    }
}

impl Default for PnpmLockParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Split a lock key into `(name, version)`.
///
/// Scoped keys (`@scope/name@1.2.3`) split at the last `@`; everything else
/// splits at the first `@`. Returns `None` when either half would be empty.
pub fn parse_package_key(key: &str) -> Option<(String, String)> {
    let (name, version) = if key.starts_with('@') {
        let at = key.rfind('@').filter(|&at| at > 0)?;
        (&key[..at], &key[at + 1..])
    } else {
        key.split_once('@')?
    };

    if name.is_empty() || version.is_empty() {
        return None;
    }

    Some((name.to_string(), version.to_string()))
}

/// Copy a sub-mapping through as opaque metadata. Anything that is not a
/// string-keyed mapping is dropped.
fn metadata_from(value: &Value) -> Option<Metadata> {
    if !value.is_mapping() {
        return None;
    }
    serde_yaml::from_value(value.clone()).ok()
}
