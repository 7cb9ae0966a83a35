//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML), from SCRIPT_BRIDGE_CONFIG or ./bridge.toml
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → BridgeConfig (validated, immutable)
//!     → lifecycle/startup.rs builds the store, router and server from it
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use schema::{
    BridgeConfig, EngineConfig, LimitsConfig, ListenerConfig, Mode, ObservabilityConfig,
    RoutingConfig, SourceConfig, StoreConfig, WatcherConfig,
};
pub use validation::ValidationError;
