//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the bridge.
//! All types derive Serde traits for deserialization from config files.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::vfs::Origin;

/// Root configuration for the script bridge.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct BridgeConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Document root and script naming.
    pub source: SourceConfig,

    /// Development (watched, mutable) or frozen (immutable, memoized).
    pub mode: Mode,

    /// Store layering policy.
    pub store: StoreConfig,

    /// Router policy.
    pub routing: RoutingConfig,

    /// Filesystem watcher tuning.
    pub watcher: WatcherConfig,

    /// External script engine.
    pub engine: EngineConfig,

    /// Request limits.
    pub limits: LimitsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Where scripts come from and how they are named.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Document root scanned at startup.
    pub root: PathBuf,

    /// Script extension without the dot.
    pub extension: String,

    /// Stem of directory index scripts.
    pub index_name: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            extension: "php".to_string(),
            index_name: "index".to_string(),
        }
    }
}

/// Runtime mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Filesystem is watched and the namespace may change at any time.
    #[default]
    Development,
    /// Namespace is fixed after startup.
    Frozen,
}

impl Mode {
    pub fn is_frozen(self) -> bool {
        matches!(self, Mode::Frozen)
    }
}

/// Store layering policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Origins from highest to lowest precedence.
    pub precedence: Vec<Origin>,

    /// Reject a path already supplied by a different origin.
    pub strict_uniqueness: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            precedence: vec![Origin::Virtual, Origin::Embedded, Origin::Disk],
            strict_uniqueness: false,
        }
    }
}

/// Router policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Let a method-agnostic script answer methods without a suffixed sibling.
    pub method_fallback: bool,

    /// URL prefix the bridge is mounted under (e.g., "/app").
    pub mount_prefix: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            method_fallback: true,
            mount_prefix: None,
        }
    }
}

/// Filesystem watcher tuning.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatcherConfig {
    /// Quiet period used to coalesce bursts of events.
    pub debounce_ms: u64,

    /// Poll interval when the polling backend is used.
    pub poll_interval_ms: u64,

    /// Skip native notifications and always poll.
    pub force_polling: bool,
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 50,
            poll_interval_ms: 1000,
            force_polling: false,
        }
    }
}

/// External script engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Program invoked per request (CGI protocol).
    pub program: String,

    /// Extra arguments; the script path travels in `SCRIPT_FILENAME`.
    pub args: Vec<String>,

    /// Per-invocation timeout; absent means no timeout.
    pub timeout_secs: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            program: "php-cgi".to_string(),
            args: Vec::new(),
            timeout_secs: None,
        }
    }
}

/// Request limits.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum accepted request body.
    pub max_body_bytes: usize,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: Option<u64>,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_body_bytes: 8 * 1024 * 1024,
            request_timeout_secs: None,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: BridgeConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.source.extension, "php");
        assert_eq!(config.mode, Mode::Development);
        assert_eq!(
            config.store.precedence,
            vec![Origin::Virtual, Origin::Embedded, Origin::Disk]
        );
        assert!(config.routing.method_fallback);
        assert_eq!(config.watcher.debounce_ms, 50);
        assert_eq!(config.limits.max_body_bytes, 8 * 1024 * 1024);
        assert!(!config.observability.metrics_enabled);
    }

    #[test]
    fn test_full_config_parses() {
        let config: BridgeConfig = toml::from_str(
            r#"
            mode = "frozen"

            [listener]
            bind_address = "0.0.0.0:9000"

            [source]
            root = "/srv/www"
            extension = "phtml"

            [store]
            precedence = ["disk", "virtual", "embedded"]
            strict_uniqueness = true

            [routing]
            method_fallback = false
            mount_prefix = "/app"

            [engine]
            program = "/usr/bin/php-cgi"
            args = ["-d", "display_errors=0"]
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert!(config.mode.is_frozen());
        assert_eq!(config.source.root, PathBuf::from("/srv/www"));
        assert_eq!(config.source.index_name, "index");
        assert_eq!(config.store.precedence[0], Origin::Disk);
        assert!(config.store.strict_uniqueness);
        assert_eq!(config.routing.mount_prefix.as_deref(), Some("/app"));
        assert_eq!(config.engine.args.len(), 2);
        assert_eq!(config.engine.timeout_secs, Some(10));
    }
}
