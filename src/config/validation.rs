//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, pool sizes)
//! - Check that live backends have somewhere to connect to
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServiceConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{BackendMode, ServiceConfig};

/// A single semantic problem with a configuration.
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

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Check a loaded configuration, collecting every problem found.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.timeouts.backend_secs == 0 {
        errors.push(ValidationError::new("timeouts.backend_secs", "must be greater than 0"));
    } else if config.timeouts.backend_secs > config.timeouts.request_secs {
        errors.push(ValidationError::new(
            "timeouts.backend_secs",
            "must not exceed timeouts.request_secs",
        ));
    }

    if config.counter.key.trim().is_empty() {
        errors.push(ValidationError::new("counter.key", "must not be empty"));
    }

    if let Some(endpoint) = &config.observability.otlp_endpoint {
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            errors.push(ValidationError::new(
                "observability.otlp_endpoint",
                "must be an http:// or https:// URL",
            ));
        }
    }

    if config.mode == BackendMode::Live {
        let url = &config.counter.url;
        if !(url.starts_with("redis://") || url.starts_with("rediss://")) {
            errors.push(ValidationError::new(
                "counter.url",
                "must use the redis:// or rediss:// scheme",
            ));
        }
        if config.append_log.dsn.trim().is_empty() {
            errors.push(ValidationError::new("append_log.dsn", "required in live mode"));
        }
        if config.append_log.max_connections == 0 {
            errors.push(ValidationError::new(
                "append_log.max_connections",
                "must be at least 1",
            ));
        }
        if config.queue.queue_url.trim().is_empty() {
            errors.push(ValidationError::new("queue.queue_url", "required in live mode"));
        }
        if config.queue.region.trim().is_empty() {
            errors.push(ValidationError::new("queue.region", "must not be empty"));
        }
        if config.queue.access_key_id.is_some() != config.queue.secret_access_key.is_some() {
            errors.push(ValidationError::new(
                "queue.access_key_id",
                "access_key_id and secret_access_key must be set together",
            ));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
