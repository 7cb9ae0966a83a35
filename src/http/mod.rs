//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, body limit, tracing)
//!     → handler.rs (ScriptHandler / RenderHandler)
//!         → routing (resolve) → context (build) → engine (execute)
//!         → fallback service when no script matches
//!     → response.rs (engine output to HTTP response)
//!     → error.rs (typed failures to status codes)
//!     → Send to client
//! ```

pub mod error;
pub mod handler;
pub mod request;
pub mod response;
pub mod server;

pub use error::RequestError;
pub use handler::{RenderFn, RenderHandler, ScriptHandler};
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
