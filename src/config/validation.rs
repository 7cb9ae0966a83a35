//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check the document root exists
//! - Validate naming conventions, precedence order and addresses
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: BridgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::BridgeConfig;
use crate::vfs::Precedence;

/// A single semantic violation, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn is_plain_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['.', '/', '\\'])
}

/// Validate a parsed configuration.
pub fn validate_config(config: &BridgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if !config.source.root.is_dir() {
        errors.push(ValidationError::new(
            "source.root",
            format!("{} is not an existing directory", config.source.root.display()),
        ));
    }
    if !is_plain_name(&config.source.extension) {
        errors.push(ValidationError::new(
            "source.extension",
            "must be non-empty without dots or slashes",
        ));
    }
    if !is_plain_name(&config.source.index_name) {
        errors.push(ValidationError::new(
            "source.index_name",
            "must be non-empty without dots or slashes",
        ));
    }

    if Precedence::from_order(&config.store.precedence).is_none() {
        errors.push(ValidationError::new(
            "store.precedence",
            "must list disk, embedded and virtual exactly once",
        ));
    }

    if let Some(prefix) = &config.routing.mount_prefix {
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            errors.push(ValidationError::new(
                "routing.mount_prefix",
                "must start with '/' and not end with '/'",
            ));
        }
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("invalid socket address '{}'", config.listener.bind_address),
        ));
    }
    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address '{}'", config.observability.metrics_address),
        ));
    }

    if config.watcher.debounce_ms == 0 {
        errors.push(ValidationError::new("watcher.debounce_ms", "must be greater than 0"));
    }
    if config.watcher.poll_interval_ms == 0 {
        errors.push(ValidationError::new("watcher.poll_interval_ms", "must be greater than 0"));
    }
    if config.engine.program.trim().is_empty() {
        errors.push(ValidationError::new("engine.program", "must not be empty"));
    }
    if config.engine.timeout_secs == Some(0) {
        errors.push(ValidationError::new("engine.timeout_secs", "must be greater than 0"));
    }
    if config.limits.max_body_bytes == 0 {
        errors.push(ValidationError::new("limits.max_body_bytes", "must be greater than 0"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vfs::Origin;

    fn valid() -> BridgeConfig {
        let mut config = BridgeConfig::default();
        config.source.root = std::env::temp_dir();
        config
    }

    #[test]
    fn test_defaults_are_valid() {
        assert_eq!(validate_config(&valid()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = valid();
        config.source.root = "/definitely/not/here".into();
        config.source.extension = ".php".to_string();
        config.store.precedence = vec![Origin::Disk, Origin::Disk];
        config.routing.mount_prefix = Some("app/".to_string());
        config.listener.bind_address = "nope".to_string();
        config.watcher.debounce_ms = 0;

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<&str> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "source.root",
                "source.extension",
                "store.precedence",
                "routing.mount_prefix",
                "listener.bind_address",
                "watcher.debounce_ms",
            ]
        );
    }

    #[test]
    fn test_metrics_address_checked_only_when_enabled() {
        let mut config = valid();
        config.observability.metrics_address = "bad".to_string();
        assert!(validate_config(&config).is_ok());
        config.observability.metrics_enabled = true;
        assert_eq!(validate_config(&config).unwrap_err()[0].field, "observability.metrics_address");
    }
}
