//! Dependency tree persistence and audit work-list enumeration.

use crate::types::{AuditError, AuditWorkItem, DependencyTree, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// File name of the tree snapshot written beside the lock file.
pub const TREE_FILE_NAME: &str = "pnpm_dependency_tree.json";

/// Where the tree snapshot for `lock_file` goes.
pub fn tree_output_path(lock_file: &Path) -> PathBuf {
    lock_file
        .parent()
        .unwrap_or_else(|| Path::new(""))
        .join(TREE_FILE_NAME)
}

/// Write `tree` as pretty-printed JSON to `path`.
pub fn save_dependency_tree(tree: &DependencyTree, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(tree)?;

    fs::write(path, json).map_err(|source| AuditError::TreeWrite {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Dependency tree saved to {}", path.display());
    Ok(())
}

/// Read a tree snapshot previously written by [`save_dependency_tree`].
pub fn load_dependency_tree(path: &Path) -> Result<DependencyTree> {
    let contents = fs::read_to_string(path).map_err(|source| AuditError::TreeRead {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(serde_json::from_str(&contents)?)
}

/// Work items for every package, ascending by name, numbered from 0.
///
/// The order only fixes report positions; probes run in whatever order
/// the worker pool picks them up.
pub fn audit_items(tree: &DependencyTree) -> impl Iterator<Item = AuditWorkItem> + '_ {
    tree.packages
        .iter()
        .enumerate()
        .map(|(position, (name, record))| AuditWorkItem {
            name: name.clone(),
            version: record.version.clone(),
            origin: record.origin,
            position,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::PnpmLockParser;
    use crate::types::{Origin, PackageRecord};

    fn sample_tree() -> DependencyTree {
        let lock = r#"
packages:
  zod@3.22.4:
    resolution: {integrity: sha512-zod}
  '@babel/core@7.23.0':
    resolution: {integrity: sha512-babel}
    engines: {node: '>=6.9.0'}
  left-pad@1.3.0(foo@2.3.0):
    resolution: {integrity: sha512-pad}
"#;
        PnpmLockParser::new().parse_str(lock).unwrap()
    }

    #[test]
    fn test_tree_output_path_is_beside_lock_file() {
        assert_eq!(
            tree_output_path(Path::new("/work/app/pnpm-lock.yaml")),
            PathBuf::from("/work/app/pnpm_dependency_tree.json")
        );
        assert_eq!(
            tree_output_path(Path::new("pnpm-lock.yaml")),
            PathBuf::from("pnpm_dependency_tree.json")
        );
    }

    #[test]
    fn test_save_and_reload_tree() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TREE_FILE_NAME);
        let tree = sample_tree();

        save_dependency_tree(&tree, &path).unwrap();
        let reloaded = load_dependency_tree(&path).unwrap();

        assert_eq!(reloaded, tree);
    }

    #[test]
    fn test_saved_tree_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(TREE_FILE_NAME);
        save_dependency_tree(&sample_tree(), &path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(
            json["packages"]["@babel/core"],
            serde_json::json!({
                "version": "7.23.0",
                "type": "package",
                "resolution": { "integrity": "sha512-babel" },
                "engines": { "node": ">=6.9.0" }
            })
        );
        assert_eq!(
            json["packages"]["foo"],
            serde_json::json!({ "version": "2.3.0", "type": "indirect" })
        );
    }

    #[test]
    fn test_save_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("does-not-exist").join(TREE_FILE_NAME);

        let err = save_dependency_tree(&sample_tree(), &path).unwrap_err();
        assert!(matches!(err, AuditError::TreeWrite { .. }));
    }

    #[test]
    fn test_audit_items_sorted_and_numbered() {
        let items: Vec<AuditWorkItem> = audit_items(&sample_tree()).collect();

        let names: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(names, vec!["@babel/core", "foo", "left-pad", "zod"]);

        let positions: Vec<usize> = items.iter().map(|i| i.position).collect();
        assert_eq!(positions, vec![0, 1, 2, 3]);

        assert_eq!(items[1].origin, Origin::Indirect);
        assert_eq!(items[2].version, "1.3.0(foo@2.3.0)");
    }

    #[test]
    fn test_audit_items_repeatable() {
        let mut tree = sample_tree();
        tree.packages
            .insert("abbrev".to_string(), PackageRecord::declared("1.1.1"));

        let first: Vec<AuditWorkItem> = audit_items(&tree).collect();
        let second: Vec<AuditWorkItem> = audit_items(&tree).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_audit_items_empty_tree() {
        assert_eq!(audit_items(&DependencyTree::default()).count(), 0);
    }
}
