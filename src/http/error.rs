//! Per-request error mapping.
//!
//! # Design Decisions
//! - Development mode renders the underlying error for diagnostics
//! - Frozen mode only shows the canonical status text
//! - Server errors are logged at error level, client errors at debug

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use crate::config::Mode;
use crate::context::ContextError;
use crate::engine::EngineError;
use crate::vfs::VfsError;

/// Anything that stops a request from producing script output.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error(transparent)]
    Vfs(#[from] VfsError),

    #[error(transparent)]
    Context(#[from] ContextError),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Vfs(VfsError::InvalidPath { .. }) => StatusCode::BAD_REQUEST,
            RequestError::Vfs(VfsError::NotFound(_)) => StatusCode::NOT_FOUND,
            RequestError::Vfs(_) => StatusCode::INTERNAL_SERVER_ERROR,
            RequestError::Context(ContextError::Upload(_)) => StatusCode::INTERNAL_SERVER_ERROR,
            RequestError::Context(ContextError::TooLarge { .. }) => StatusCode::PAYLOAD_TOO_LARGE,
            RequestError::Context(_) => StatusCode::BAD_REQUEST,
            RequestError::Engine(EngineError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            RequestError::Engine(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Metric label for the request outcome.
    pub fn outcome(&self) -> &'static str {
        match self.status() {
            StatusCode::NOT_FOUND => "not_found",
            status if status.is_client_error() => "bad_request",
            _ => "error",
        }
    }

    /// Render as an HTTP response according to `mode`.
    pub fn into_response_for(self, mode: Mode) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(status = status.as_u16(), error = %self, "Script request failed");
        } else {
            tracing::debug!(status = status.as_u16(), error = %self, "Request rejected");
        }

        let reason = status.canonical_reason().unwrap_or("Error");
        let body = match mode {
            Mode::Development => format!("{} {reason}\n\n{self}\n", status.as_u16()),
            Mode::Frozen => format!("{} {reason}\n", status.as_u16()),
        };
        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            body,
        )
            .into_response()
    }
}
