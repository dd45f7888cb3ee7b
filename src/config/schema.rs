//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the inventory service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Which backend clients to construct at startup.
    pub mode: BackendMode,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Counter store (Redis) settings.
    pub counter: CounterConfig,

    /// Durable append log (Postgres) settings.
    pub append_log: AppendLogConfig,

    /// Message queue (SQS) settings.
    pub queue: QueueConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Backend selection.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackendMode {
    /// Redis, Postgres and SQS clients.
    #[default]
    Live,
    /// In-process stores; nothing leaves the process.
    Memory,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Deadline for a whole `/data` request in seconds.
    pub request_secs: u64,

    /// Deadline for a single backend call in seconds.
    pub backend_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            backend_secs: 5,
        }
    }
}

/// Counter store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CounterConfig {
    /// Redis connection URL.
    pub url: String,

    /// Name of the counter incremented on every request.
    pub key: String,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            key: "hits".to_string(),
        }
    }
}

/// Append log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppendLogConfig {
    /// Postgres connection string.
    pub dsn: String,

    /// Maximum pooled connections.
    pub max_connections: u32,

    /// How long to wait for a pooled connection, in seconds.
    pub acquire_timeout_secs: u64,
}

impl Default for AppendLogConfig {
    fn default() -> Self {
        Self {
            dsn: String::new(),
            max_connections: 5,
            acquire_timeout_secs: 5,
        }
    }
}

/// Message queue configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct QueueConfig {
    /// Custom endpoint (e.g., a localstack URL). `None` uses the AWS default.
    pub endpoint_url: Option<String>,

    /// URL of the queue messages are published to.
    pub queue_url: String,

    /// AWS region.
    pub region: String,

    /// Static access key id. When unset the default credential chain is used.
    pub access_key_id: Option<String>,

    /// Static secret access key, paired with `access_key_id`.
    pub secret_access_key: Option<String>,

    /// Value of the `source` field in every published message.
    pub source: String,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            queue_url: String::new(),
            region: "us-east-1".to_string(),
            access_key_id: None,
            secret_access_key: None,
            source: "inventory-service".to_string(),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Service name reported on spans.
    pub service_name: String,

    /// Default diagnostic log filter when `RUST_LOG` is unset.
    pub log_level: String,

    /// Expose `GET /metrics`.
    pub metrics_enabled: bool,

    /// OTLP gRPC collector endpoint (e.g., "http://tempo:4317").
    /// Spans are not exported when unset.
    pub otlp_endpoint: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            service_name: "inventory-service".to_string(),
            log_level: "inventory_service=info,tower_http=info".to_string(),
            metrics_enabled: true,
            otlp_endpoint: None,
        }
    }
}
