//! Materialization of in-memory files to real disk paths.
//!
//! The script engine takes a filesystem path, so embedded and virtual
//! entries are written once into a private directory and the resulting
//! path is memoized per logical path and version.
//!
//! # Concurrency
//! The memo is a `DashMap`; `entry()` holds the shard lock while the
//! write happens, so concurrent first accesses to one path perform a
//! single write and the others reuse its result. Writes go through a
//! named temp file followed by an atomic rename, so a reader never sees a
//! half-written script.

use std::io::Write;
use std::path::{Path, PathBuf};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tempfile::{NamedTempFile, TempDir};

use crate::observability::metrics;
use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::file::VirtualFile;
use crate::vfs::path::LogicalPath;

/// Real filesystem location handed to the script engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLocation {
    pub script_path: PathBuf,
    pub document_root: PathBuf,
}

#[derive(Debug, Clone)]
struct Materialized {
    version: u64,
    path: PathBuf,
}

/// Writes non-disk files into a private temporary directory on demand.
#[derive(Debug)]
pub struct Materializer {
    dir: TempDir,
    memo: DashMap<LogicalPath, Materialized>,
}

impl Materializer {
    /// Create a materializer backed by a fresh private directory.
    ///
    /// The directory is removed when the materializer drops.
    pub fn new() -> VfsResult<Self> {
        let dir = tempfile::Builder::new()
            .prefix("script-bridge-")
            .tempdir()
            .map_err(|e| VfsError::io(std::env::temp_dir(), e))?;
        Ok(Self {
            dir,
            memo: DashMap::new(),
        })
    }

    /// Document root for materialized files.
    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Return a real path holding `file`'s content, writing it if needed.
    pub fn materialize(&self, file: &VirtualFile) -> VfsResult<PathBuf> {
        let entry = self.memo.entry(file.path().clone());
        if let Entry::Occupied(existing) = &entry {
            let memo = existing.get();
            // A newer version already on disk wins over a stale caller.
            if memo.version >= file.version() {
                return Ok(memo.path.clone());
            }
        }

        let target = self.write(file)?;
        metrics::record_materialization(file.origin().as_str());
        tracing::debug!(
            path = %file.path(),
            version = file.version(),
            target = %target.display(),
            "Materialized virtual file"
        );

        entry.insert(Materialized {
            version: file.version(),
            path: target.clone(),
        });
        Ok(target)
    }

    /// Forget the memoized copy so the next access writes fresh content.
    pub fn invalidate(&self, path: &LogicalPath) {
        self.memo.remove(path);
    }

    /// Forget the memoized copy and delete it from disk.
    pub fn discard(&self, path: &LogicalPath) {
        if let Some((_, memo)) = self.memo.remove(path) {
            if let Err(e) = std::fs::remove_file(&memo.path) {
                tracing::debug!(path = %path, error = %e, "Could not remove materialized copy");
            }
        }
    }

    /// Number of memoized files.
    pub fn len(&self) -> usize {
        self.memo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.memo.is_empty()
    }

    fn write(&self, file: &VirtualFile) -> VfsResult<PathBuf> {
        let target = self.root().join(file.path().relative());
        let parent = target.parent().unwrap_or_else(|| self.root());
        std::fs::create_dir_all(parent).map_err(|e| VfsError::io(parent, e))?;

        let content = file.read()?;
        let mut tmp = NamedTempFile::new_in(parent).map_err(|e| VfsError::io(parent, e))?;
        tmp.write_all(&content)
            .map_err(|e| VfsError::io(tmp.path(), e))?;
        tmp.persist(&target)
            .map_err(|e| VfsError::io(&target, e.error))?;
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::file::{Content, Origin};
    use std::sync::Arc;

    fn virtual_file(path: &str, body: &str, version: u64) -> VirtualFile {
        VirtualFile::new(
            LogicalPath::parse(path).unwrap(),
            Origin::Virtual,
            Content::bytes(body),
            version,
        )
    }

    #[test]
    fn test_materialize_is_idempotent() {
        let materializer = Materializer::new().unwrap();
        let file = virtual_file("/pages/home.php", "<?php echo 1;", 1);

        let first = materializer.materialize(&file).unwrap();
        let second = materializer.materialize(&file).unwrap();

        assert_eq!(first, second);
        assert!(first.starts_with(materializer.root()));
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "<?php echo 1;");
        assert_eq!(materializer.len(), 1);
    }

    #[test]
    fn test_new_version_rewrites_content() {
        let materializer = Materializer::new().unwrap();
        let path = materializer
            .materialize(&virtual_file("/a.php", "old", 1))
            .unwrap();
        let again = materializer
            .materialize(&virtual_file("/a.php", "new", 2))
            .unwrap();

        assert_eq!(path, again);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");

        // A stale caller does not roll content back.
        materializer
            .materialize(&virtual_file("/a.php", "old", 1))
            .unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn test_discard_removes_copy() {
        let materializer = Materializer::new().unwrap();
        let file = virtual_file("/gone.php", "x", 1);
        let path = materializer.materialize(&file).unwrap();

        materializer.discard(file.path());
        assert!(!path.exists());
        assert!(materializer.is_empty());
    }

    #[test]
    fn test_concurrent_first_access_agrees() {
        let materializer = Arc::new(Materializer::new().unwrap());
        let file = Arc::new(virtual_file("/shared/x.php", "same", 7));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = materializer.clone();
                let f = file.clone();
                std::thread::spawn(move || m.materialize(&f).unwrap())
            })
            .collect();
        let paths: Vec<PathBuf> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(paths.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(std::fs::read_to_string(&paths[0]).unwrap(), "same");
    }

    #[test]
    fn test_root_removed_on_drop() {
        let materializer = Materializer::new().unwrap();
        let root = materializer.root().to_path_buf();
        materializer
            .materialize(&virtual_file("/a.php", "x", 1))
            .unwrap();
        drop(materializer);
        assert!(!root.exists());
    }
}
