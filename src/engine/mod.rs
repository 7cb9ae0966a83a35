//! Script engine boundary.
//!
//! # Data Flow
//! ```text
//! RequestContext (script location + channels)
//!     → Invocation
//!     → ScriptEngine::execute (cgi.rs spawns an external program)
//!     → EngineOutput (status, headers, body)
//!     → http/response.rs writes it to the client
//! ```
//!
//! # Design Decisions
//! - The engine is a trait object so hosts and tests can swap it
//! - Execution returns a boxed future; dropping it abandons the invocation
//! - No timeout unless one is configured

pub mod cgi;
pub mod error;

use std::path::PathBuf;

use axum::body::Bytes;
use axum::http::{HeaderMap, StatusCode};
use futures_util::future::BoxFuture;

use crate::context::RequestContext;

pub use cgi::CgiEngine;
pub use error::EngineError;

/// One script execution request.
#[derive(Debug)]
pub struct Invocation {
    /// Real filesystem path of the script.
    pub script_path: PathBuf,
    pub document_root: PathBuf,
    pub context: RequestContext,
}

impl Invocation {
    pub fn new(context: RequestContext) -> Self {
        Self {
            script_path: context.location.script_path.clone(),
            document_root: context.location.document_root.clone(),
            context,
        }
    }
}

/// What a script produced.
#[derive(Debug, Clone)]
pub struct EngineOutput {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl EngineOutput {
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }
}

/// External script interpreter.
pub trait ScriptEngine: Send + Sync + 'static {
    fn execute(&self, invocation: Invocation) -> BoxFuture<'static, Result<EngineOutput, EngineError>>;
}
