//! Backend client contracts.
//!
//! # Data Flow
//! ```text
//! RequestOrchestrator
//!     → CounterStore::increment     (redis_counter.rs | memory.rs)
//!     → AppendLogStore::append      (postgres.rs      | memory.rs)
//!     → EventPublisher::publish     (sqs.rs           | memory.rs)
//! ```
//!
//! # Design Decisions
//! - One long-lived, shareable handle per backend (`Arc<dyn …>`); clients
//!   pool or multiplex internally and never connect per request
//! - Each contract has its own error kinds so the orchestrator can tell
//!   "counter unavailable" from "append rejected" without string matching
//! - No retries at this layer

pub mod memory;
pub mod postgres;
pub mod redis_counter;
pub mod sqs;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

/// Atomic increment-and-read over named counters.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Increment `name` by one and return the new value.
    ///
    /// Concurrent callers never observe the same value twice for a name.
    async fn increment(&self, name: &str) -> Result<u64, CounterError>;

    /// Cheap liveness probe used by readiness checks.
    async fn ping(&self) -> Result<(), CounterError>;
}

/// Durable, append-only event storage.
#[async_trait]
pub trait AppendLogStore: Send + Sync {
    /// Append `record`, returning only once it is committed.
    async fn append(&self, record: &LogRecord) -> Result<(), AppendError>;

    async fn ping(&self) -> Result<(), AppendError>;
}

/// Best-effort, at-least-once message publishing.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), PublishError>;

    async fn ping(&self, channel: &str) -> Result<(), PublishError>;
}

/// The three shared client handles a request is served with.
#[derive(Clone)]
pub struct Backends {
    pub counter: Arc<dyn CounterStore>,
    pub append_log: Arc<dyn AppendLogStore>,
    pub publisher: Arc<dyn EventPublisher>,
}

/// One access event written to the append log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    pub fn now() -> Self {
        Self { timestamp: Utc::now() }
    }
}

/// Queue message announcing a new counter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub source: String,
    pub hits: u64,
}

impl Message {
    /// Serialize to the JSON body placed on the queue.
    pub fn to_payload(&self) -> Vec<u8> {
        // Serializing a string and an integer cannot fail.
        serde_json::to_vec(self).unwrap_or_default()
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CounterError {
    /// Connection failure or timeout; the two are not distinguished.
    #[error("counter backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl CounterError {
    pub fn kind(&self) -> &'static str {
        match self {
            CounterError::BackendUnavailable(_) => "backend_unavailable",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AppendError {
    #[error("append log connection failure: {0}")]
    ConnectionFailure(String),

    #[error("append log constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("append log timed out")]
    Timeout,
}

impl AppendError {
    /// Stable snake_case name used in log records and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            AppendError::ConnectionFailure(_) => "connection_failure",
            AppendError::ConstraintViolation(_) => "constraint_violation",
            AppendError::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishError {
    #[error("channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("payload of {size} bytes exceeds the {limit} byte limit")]
    PayloadTooLarge { size: usize, limit: usize },

    #[error("payload is not valid UTF-8: {0}")]
    InvalidPayload(String),

    #[error("publish timed out")]
    Timeout,
}

impl PublishError {
    pub fn kind(&self) -> &'static str {
        match self {
            PublishError::ChannelUnavailable(_) => "channel_unavailable",
            PublishError::PayloadTooLarge { .. } => "payload_too_large",
            PublishError::InvalidPayload(_) => "invalid_payload",
            PublishError::Timeout => "timeout",
        }
    }
}

/// Strip credentials from a connection URL before logging it.
pub(crate) fn redact(url: &str) -> String {
    match (url.find("://"), url.rfind('@')) {
        (Some(scheme_end), Some(at)) if at > scheme_end => {
            format!("{}***{}", &url[..scheme_end + 3], &url[at..])
        }
        _ => url.to_string(),
    }
}
