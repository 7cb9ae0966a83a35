//! Disk scanning.
//!
//! Walks the document root and registers every regular file as a
//! disk-origin entry. Dot-prefixed files and directories are skipped.

use std::path::Path;

use walkdir::{DirEntry, WalkDir};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::file::{Content, Origin};
use crate::vfs::store::VirtualStore;

fn is_hidden(entry: &DirEntry) -> bool {
    entry.depth() > 0
        && entry
            .file_name()
            .to_str()
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
}

/// Register every file below `dir` (which must live under the store's disk root).
///
/// Returns the number of files registered.
pub fn scan_dir(store: &VirtualStore, dir: &Path) -> VfsResult<usize> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .follow_links(true)
        .into_iter()
        .filter_entry(|e| !is_hidden(e))
    {
        let entry = entry.map_err(|e| {
            let path = e.path().unwrap_or(dir).to_path_buf();
            VfsError::io(path, e.into())
        })?;
        if entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    files.sort();

    let mut registered = 0;
    for disk_path in files {
        let Some(logical) = store.logical_path_for_disk(&disk_path) else {
            tracing::warn!(path = %disk_path.display(), "Skipping file with non UTF-8 or invalid name");
            continue;
        };
        store.register_at(Origin::Disk, logical, Content::Disk(disk_path))?;
        registered += 1;
    }
    Ok(registered)
}

/// Register the whole document root.
pub fn scan_disk(store: &VirtualStore) -> VfsResult<usize> {
    let root = store.disk_root().to_path_buf();
    let count = scan_dir(store, &root)?;
    tracing::info!(root = %root.display(), files = count, "Scanned document root");
    Ok(count)
}
