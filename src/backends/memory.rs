//! In-process backends.
//!
//! Used by `mode = "memory"` for local runs and by tests. They honour the
//! same contracts as the live clients: increments are atomic per name and
//! appends are visible as soon as the call returns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use dashmap::DashMap;

use super::{
    AppendError, AppendLogStore, CounterError, CounterStore, EventPublisher, LogRecord,
    PublishError,
};

/// Counters held in a concurrent map.
#[derive(Clone, Default)]
pub struct MemoryCounterStore {
    counters: Arc<DashMap<String, AtomicU64>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of `name`, 0 if never incremented.
    pub fn get(&self, name: &str) -> u64 {
        self.counters
            .get(name)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn increment(&self, name: &str) -> Result<u64, CounterError> {
        let entry = self.counters.entry(name.to_string()).or_default();
        Ok(entry.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn ping(&self) -> Result<(), CounterError> {
        Ok(())
    }
}

/// Append log backed by a vector.
#[derive(Clone, Default)]
pub struct MemoryAppendLog {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

impl MemoryAppendLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl AppendLogStore for MemoryAppendLog {
    async fn append(&self, record: &LogRecord) -> Result<(), AppendError> {
        let mut records = self
            .records
            .lock()
            .map_err(|_| AppendError::ConnectionFailure("append log lock poisoned".into()))?;
        records.push(*record);
        Ok(())
    }

    async fn ping(&self) -> Result<(), AppendError> {
        Ok(())
    }
}

/// A message captured by [`MemoryPublisher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub channel: String,
    pub payload: Vec<u8>,
}

/// Publisher that keeps every message it is handed.
#[derive(Clone, Default)]
pub struct MemoryPublisher {
    published: Arc<Mutex<Vec<PublishedMessage>>>,
}

impl MemoryPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn published(&self) -> Vec<PublishedMessage> {
        self.published.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EventPublisher for MemoryPublisher {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), PublishError> {
        let mut published = self
            .published
            .lock()
            .map_err(|_| PublishError::ChannelUnavailable("publisher lock poisoned".into()))?;
        published.push(PublishedMessage {
            channel: channel.to_string(),
            payload: payload.to_vec(),
        });
        Ok(())
    }

    async fn ping(&self, _channel: &str) -> Result<(), PublishError> {
        Ok(())
    }
}
