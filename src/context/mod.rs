//! Request context subsystem.
//!
//! # Data Flow
//! ```text
//! HTTP request + RouteMatch + ScriptLocation (+ RenderData in render mode)
//!     → builder.rs (server variables, query string, remote address)
//!     → body.rs (form / multipart / JSON by Content-Type)
//!     → render.rs (host values, serialized per key)
//!     → RequestContext (owned by one request, dropped with it)
//!     → environment() flattens it into engine channels
//! ```
//!
//! # Channels
//! Standard CGI variables keep their usual names. Everything this crate
//! adds lives under the `BRIDGE_` prefix so it can never collide with
//! them: path parameters, raw path segments, decoded JSON body, query,
//! form fields, uploads, and one `BRIDGE_RENDER_<name>` per host value.
//!
//! # Design Decisions
//! - Construction never touches the store
//! - A bad JSON body is an error, not an empty value
//! - A render value that fails to serialize is dropped alone

pub mod body;
pub mod builder;
pub mod error;
pub mod render;
pub mod request;

pub use body::UploadedFile;
pub use builder::ContextBuilder;
pub use error::ContextError;
pub use render::RenderData;
pub use request::RequestContext;

/// JSON object of path parameters, always present.
pub const PATH_PARAMS_KEY: &str = "BRIDGE_PATH_PARAMS";
/// JSON array of raw path segments, always present.
pub const PATH_SEGMENTS_KEY: &str = "BRIDGE_PATH_SEGMENTS";
/// Decoded JSON body, present only for JSON requests.
pub const JSON_BODY_KEY: &str = "BRIDGE_JSON_BODY";
/// JSON object of query parameters.
pub const QUERY_KEY: &str = "BRIDGE_QUERY";
/// JSON object of form fields (URL-encoded or multipart text fields).
pub const FORM_KEY: &str = "BRIDGE_FORM";
/// JSON array of uploaded file descriptors.
pub const UPLOADS_KEY: &str = "BRIDGE_UPLOADS";
/// Prefix of host-injected render values.
pub const RENDER_PREFIX: &str = "BRIDGE_RENDER_";
