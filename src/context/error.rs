//! Context construction errors.

use thiserror::Error;

/// Per-request failures while building a context. The store is never affected.
#[derive(Debug, Error)]
pub enum ContextError {
    /// Body present but undecodable per its declared content type.
    #[error("invalid {content_type} body: {reason}")]
    InvalidBody {
        content_type: String,
        reason: String,
    },

    /// The body stream failed.
    #[error("failed to read request body: {0}")]
    BodyRead(String),

    #[error("request body exceeds {limit} bytes")]
    TooLarge { limit: usize },

    /// Spilling an upload to disk failed.
    #[error("failed to store upload: {0}")]
    Upload(#[from] std::io::Error),
}

impl ContextError {
    pub(crate) fn invalid(content_type: &str, reason: impl ToString) -> Self {
        Self::InvalidBody {
            content_type: content_type.to_string(),
            reason: reason.to_string(),
        }
    }
}
