//! Virtual file entries.

use std::borrow::Cow;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::vfs::error::{VfsError, VfsResult};
use crate::vfs::path::LogicalPath;

/// Where a virtual file's bytes physically come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    Disk,
    Embedded,
    Virtual,
}

impl Origin {
    pub const ALL: [Origin; 3] = [Origin::Disk, Origin::Embedded, Origin::Virtual];

    /// Stable slot index for per-origin layers.
    pub(crate) const fn index(self) -> usize {
        match self {
            Origin::Disk => 0,
            Origin::Embedded => 1,
            Origin::Virtual => 2,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Origin::Disk => "disk",
            Origin::Embedded => "embedded",
            Origin::Virtual => "virtual",
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File content, either held in memory or referenced on disk.
#[derive(Debug, Clone)]
pub enum Content {
    /// Owned in-memory bytes (programmatically registered files).
    Bytes(Arc<[u8]>),
    /// Bytes compiled into the binary.
    Static(&'static [u8]),
    /// A real file, read on demand.
    Disk(PathBuf),
}

impl Content {
    pub fn bytes(data: impl Into<Vec<u8>>) -> Self {
        Self::Bytes(Arc::from(data.into()))
    }
}

/// A named, versioned entry in the unified namespace.
#[derive(Debug, Clone)]
pub struct VirtualFile {
    path: LogicalPath,
    origin: Origin,
    content: Content,
    version: u64,
}

impl VirtualFile {
    pub(crate) fn new(path: LogicalPath, origin: Origin, content: Content, version: u64) -> Self {
        Self {
            path,
            origin,
            content,
            version,
        }
    }

    /// Same file placed at another logical path.
    pub(crate) fn relocated(&self, path: LogicalPath, version: u64) -> Self {
        Self {
            path,
            origin: self.origin,
            content: self.content.clone(),
            version,
        }
    }

    pub fn path(&self) -> &LogicalPath {
        &self.path
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    /// Store epoch value assigned by the mutation that produced this entry.
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Backing disk path, when the content lives in a real file.
    pub fn disk_path(&self) -> Option<&Path> {
        match &self.content {
            Content::Disk(path) => Some(path),
            _ => None,
        }
    }

    /// Read the full content.
    pub fn read(&self) -> VfsResult<Cow<'_, [u8]>> {
        match &self.content {
            Content::Bytes(bytes) => Ok(Cow::Borrowed(&bytes[..])),
            Content::Static(bytes) => Ok(Cow::Borrowed(*bytes)),
            Content::Disk(path) => std::fs::read(path)
                .map(Cow::Owned)
                .map_err(|e| VfsError::io(path, e)),
        }
    }
}
