//! Script bridge library.
//!
//! Serves script files from a unified namespace (disk, embedded and
//! programmatically registered files), routes requests to them by file
//! naming convention, and runs them through an external engine with a
//! per-request context.

// Core subsystems
pub mod config;
pub mod context;
pub mod engine;
pub mod http;
pub mod routing;
pub mod vfs;
pub mod watch;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::BridgeConfig;
pub use context::{RenderData, RequestContext};
pub use engine::{CgiEngine, EngineOutput, Invocation, ScriptEngine};
pub use http::{HttpServer, RenderHandler, ScriptHandler};
pub use lifecycle::{Bridge, BridgeBuilder, Shutdown};
pub use routing::ConventionRouter;
pub use vfs::{Content, EmbeddedAsset, Origin, VirtualStore};
