//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! RequestOrchestrator produces:
//!     → tracing.rs (root span + one child span per backend call)
//!     → logging.rs (one JSON record per significant event, with trace_id)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout, one JSON object per line)
//!     → Metrics endpoint (Prometheus scrape of GET /metrics)
//!     → Trace collector (OTLP/gRPC, batched)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace id flows from the span into every request record
//! - Metrics are cheap (atomic increments)
//! - Tracing state is constructed explicitly and injected, not global

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use logging::{LogLevel, LogSink, MemorySink, StdoutSink, StructuredLogger, StructuredRecord};
pub use self::tracing::{RequestSpan, TelemetryError, TraceContext, TraceIdentifier, NO_TRACE};
