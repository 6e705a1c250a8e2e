//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Every problem is collected so
//! an operator sees the whole list at once instead of fixing one per restart.

use std::net::SocketAddr;

use crate::config::schema::{GatewayConfig, PLACEHOLDER_ADMIN_KEY};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
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

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate a configuration, returning all errors found.
pub fn validate_config(config: &GatewayConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.limits.window_secs == 0 {
        errors.push(ValidationError::new("limits.window_secs", "window must be at least one second"));
    }
    if config.breaker.failure_threshold == 0 {
        errors.push(ValidationError::new("breaker.failure_threshold", "threshold must be at least 1"));
    }
    if config.breaker.recovery_timeout_secs == 0 {
        errors.push(ValidationError::new("breaker.recovery_timeout_secs", "recovery timeout must be positive"));
    }
    if config.identity.cache_ttl_secs == 0 {
        errors.push(ValidationError::new("identity.cache_ttl_secs", "cache TTL must be positive"));
    }
    if config.store.timeout_ms == 0 {
        errors.push(ValidationError::new("store.timeout_ms", "store timeout must be positive"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "request deadline must be positive"));
    }
    if config.kill_switch.key.trim().is_empty() {
        errors.push(ValidationError::new("kill_switch.key", "flag key must not be empty"));
    }

    check_url(&mut errors, "store.url", &config.store.url, &["redis", "rediss"]);
    check_url(&mut errors, "database.url", &config.database.url, &["postgres", "postgresql"]);
    check_addr(&mut errors, "listener.bind_address", &config.listener.bind_address);

    if config.observability.metrics_enabled {
        check_addr(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.admin.enabled {
        check_addr(&mut errors, "admin.bind_address", &config.admin.bind_address);
        if config.admin.api_key.is_empty() || config.admin.api_key == PLACEHOLDER_ADMIN_KEY {
            errors.push(ValidationError::new("admin.api_key", "set a real admin key before enabling the admin API"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_url(errors: &mut Vec<ValidationError>, field: &'static str, raw: &str, schemes: &[&str]) {
    match url::Url::parse(raw) {
        Ok(parsed) if schemes.contains(&parsed.scheme()) => {}
        Ok(parsed) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}', expected one of {:?}", parsed.scheme(), schemes),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {}", e))),
    }
}

fn check_addr(errors: &mut Vec<ValidationError>, field: &'static str, raw: &str) {
    if raw.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("'{}' is not a socket address", raw)));
    }
}
