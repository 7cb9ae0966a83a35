//! Error definitions shared by the store and the router.

use std::path::PathBuf;

use thiserror::Error;

use crate::vfs::file::Origin;

/// Errors produced while addressing the virtual namespace.
#[derive(Debug, Error)]
pub enum VfsError {
    /// The logical path is malformed and was rejected before any lookup.
    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    /// Nothing is registered under the path (or no route matched).
    #[error("not found: {0}")]
    NotFound(String),

    /// Strict registration found the path already supplied by another origin.
    #[error("{path} already provided by {existing} origin, refusing {incoming} registration")]
    Conflict {
        path: String,
        existing: Origin,
        incoming: Origin,
    },

    /// Reading or materializing file content failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl VfsError {
    pub(crate) fn invalid(path: impl Into<String>, reason: &'static str) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// True for the recoverable "nothing here" case.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Result type for virtual filesystem operations.
pub type VfsResult<T> = Result<T, VfsError>;
