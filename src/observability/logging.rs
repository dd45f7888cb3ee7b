//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the diagnostic `tracing` subscriber (stderr, JSON)
//! - Emit one JSON record per significant request event to stdout
//! - Stamp every request record with the trace identifier
//!
//! # Design Decisions
//! - Request records and diagnostics are separate streams: stdout carries
//!   only request records so log shippers can parse every line
//! - Emission is fire-and-forget; a failing sink never fails a request
//! - Log level for diagnostics configurable via config and `RUST_LOG`

use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::observability::tracing::TraceIdentifier;

/// Install the process-wide diagnostic subscriber.
pub fn init_subscriber(default_filter: &str) {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer().json().with_writer(io::stderr))
        .init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Info,
    Warn,
    Error,
}

/// A single request log line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredRecord {
    pub timestamp: String,
    pub level: LogLevel,
    pub msg: String,
    pub trace_id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

/// Destination for request records.
pub trait LogSink: Send + Sync {
    fn write_record(&self, record: &StructuredRecord) -> io::Result<()>;
}

/// Writes newline-delimited JSON to stdout.
#[derive(Debug, Default)]
pub struct StdoutSink;

impl LogSink for StdoutSink {
    fn write_record(&self, record: &StructuredRecord) -> io::Result<()> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        let mut out = io::stdout().lock();
        out.write_all(&line)?;
        out.flush()
    }
}

/// Keeps records in memory; useful when asserting on log output.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    records: Arc<Mutex<Vec<StructuredRecord>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> Vec<StructuredRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl LogSink for MemorySink {
    fn write_record(&self, record: &StructuredRecord) -> io::Result<()> {
        self.records
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "sink lock poisoned"))?
            .push(record.clone());
        Ok(())
    }
}

pub struct StructuredLogger {
    sink: Arc<dyn LogSink>,
    sink_failed: AtomicBool,
}

impl StructuredLogger {
    pub fn new(sink: Arc<dyn LogSink>) -> Self {
        Self {
            sink,
            sink_failed: AtomicBool::new(false),
        }
    }

    pub fn stdout() -> Self {
        Self::new(Arc::new(StdoutSink))
    }

    /// Emit one record. Never fails; sink errors are reported once as a
    /// diagnostic and otherwise dropped.
    pub fn emit(
        &self,
        level: LogLevel,
        msg: &str,
        trace_id: TraceIdentifier,
        fields: Map<String, Value>,
    ) {
        let record = StructuredRecord {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            level,
            msg: msg.to_string(),
            trace_id: trace_id.to_string(),
            fields,
        };

        if let Err(e) = self.sink.write_record(&record) {
            if !self.sink_failed.swap(true, Ordering::Relaxed) {
                tracing::warn!(error = %e, "Structured log sink failed; dropping records");
            }
        }
    }
}
