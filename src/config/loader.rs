//! Configuration loading from disk and the environment.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::{BackendMode, ServiceConfig};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load configuration from an optional TOML file, apply process environment
/// overrides and the command-line `mode`, and validate the result.
pub fn load_config(
    path: Option<&Path>,
    mode: Option<BackendMode>,
) -> Result<ServiceConfig, ConfigError> {
    let mut config = match path {
        Some(path) => {
            let content = fs::read_to_string(path)?;
            toml::from_str(&content)?
        }
        None => ServiceConfig::default(),
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    if let Some(mode) = mode {
        config.mode = mode;
    }
    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Overlay deployment environment variables on top of file values.
///
/// Empty values are ignored so an unset-but-declared variable in a
/// compose file does not blank out a configured value.
pub fn apply_env_overrides<F>(config: &mut ServiceConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(addr) = get("BIND_ADDRESS") {
        config.listener.bind_address = addr;
    }

    if let Some(host) = get("REDIS_HOST") {
        let port = get("REDIS_PORT").unwrap_or_else(|| "6379".to_string());
        config.counter.url = format!("redis://{}:{}/0", host, port);
    }

    if let Some(dsn) = get("POSTGRES_DSN") {
        config.append_log.dsn = dsn;
    }

    if let Some(endpoint) = get("SQS_ENDPOINT") {
        config.queue.endpoint_url = Some(endpoint);
    }
    if let Some(queue_url) = get("SQS_QUEUE_URL") {
        config.queue.queue_url = queue_url;
    }
    if let Some(region) = get("AWS_REGION") {
        config.queue.region = region;
    }

    if let Some(endpoint) = get("OTEL_EXPORTER_OTLP_ENDPOINT") {
        config.observability.otlp_endpoint = Some(endpoint);
    }
    if let Some(name) = get("OTEL_SERVICE_NAME") {
        config.observability.service_name = name;
    }
}
