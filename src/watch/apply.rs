//! Applying coalesced filesystem changes to the store.

use std::collections::BTreeSet;
use std::path::{Component, PathBuf};

use crate::vfs::scan::scan_dir;
use crate::vfs::{Content, Origin, VirtualStore};

/// Outcome of one applied batch.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BatchSummary {
    pub registered: usize,
    pub removed: usize,
    pub skipped: usize,
}

impl BatchSummary {
    pub fn changes(&self) -> usize {
        self.registered + self.removed
    }
}

fn is_hidden(store: &VirtualStore, path: &std::path::Path) -> bool {
    path.strip_prefix(store.disk_root())
        .map(|relative| {
            relative.components().any(|c| match c {
                Component::Normal(name) => name.to_str().is_some_and(|n| n.starts_with('.')),
                _ => false,
            })
        })
        .unwrap_or(true)
}

/// Reconcile the store with the current disk state of every path in `paths`.
pub fn apply_batch(store: &VirtualStore, paths: BTreeSet<PathBuf>) -> BatchSummary {
    let mut summary = BatchSummary::default();
    for path in paths {
        if is_hidden(store, &path) {
            summary.skipped += 1;
            continue;
        }
        let Some(logical) = store.logical_path_for_disk(&path) else {
            summary.skipped += 1;
            continue;
        };

        match std::fs::metadata(&path) {
            Ok(meta) if meta.is_file() => {
                match store.register_at(Origin::Disk, logical.clone(), Content::Disk(path)) {
                    Ok(_) => summary.registered += 1,
                    Err(e) => {
                        tracing::warn!(path = %logical, error = %e, "Failed to register changed file");
                        summary.skipped += 1;
                    }
                }
            }
            Ok(meta) if meta.is_dir() => match scan_dir(store, &path) {
                Ok(count) => summary.registered += count,
                Err(e) => {
                    tracing::warn!(path = %logical, error = %e, "Failed to scan new directory");
                    summary.skipped += 1;
                }
            },
            Ok(_) => summary.skipped += 1,
            Err(_) => summary.removed += store.remove_disk_under(&logical),
        }
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::vfs::StoreOptions;

    fn setup() -> (TempDir, VirtualStore) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let store = VirtualStore::new(StoreOptions::new(&root)).unwrap();
        (dir, store)
    }

    #[test]
    fn test_new_and_modified_files_registered() {
        let (_dir, store) = setup();
        let file = store.disk_root().join("a.php");
        fs::write(&file, "v1").unwrap();

        let summary = apply_batch(&store, BTreeSet::from([file.clone()]));
        assert_eq!(summary.registered, 1);
        let first = store.resolve("/a.php").unwrap();
        assert_eq!(&*first.read().unwrap(), b"v1");

        fs::write(&file, "v2").unwrap();
        apply_batch(&store, BTreeSet::from([file]));
        let second = store.resolve("/a.php").unwrap();
        assert!(second.version() > first.version());
        assert_eq!(&*second.read().unwrap(), b"v2");
    }

    #[test]
    fn test_removed_directory_drops_children() {
        let (_dir, store) = setup();
        let sub = store.disk_root().join("blog");
        fs::create_dir(&sub).unwrap();
        fs::write(sub.join("a.php"), "a").unwrap();
        fs::write(sub.join("b.php"), "b").unwrap();
        assert_eq!(apply_batch(&store, BTreeSet::from([sub.clone()])).registered, 2);

        fs::remove_dir_all(&sub).unwrap();
        let summary = apply_batch(&store, BTreeSet::from([sub]));
        assert_eq!(summary.removed, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_removal_keeps_virtual_layer() {
        let (_dir, store) = setup();
        let file = store.disk_root().join("page.php");
        fs::write(&file, "disk").unwrap();
        apply_batch(&store, BTreeSet::from([file.clone()]));
        store
            .register(Origin::Virtual, "/page.php", Content::bytes("virtual"))
            .unwrap();

        fs::remove_file(&file).unwrap();
        apply_batch(&store, BTreeSet::from([file]));
        let page = store.resolve("/page.php").unwrap();
        assert_eq!(page.origin(), Origin::Virtual);
    }

    #[test]
    fn test_hidden_and_foreign_paths_skipped() {
        let (_dir, store) = setup();
        let hidden = store.disk_root().join(".swp");
        fs::write(&hidden, "x").unwrap();
        let summary = apply_batch(
            &store,
            BTreeSet::from([hidden, PathBuf::from("/somewhere/else.php")]),
        );
        assert_eq!(summary.skipped, 2);
        assert!(store.is_empty());
    }
}
