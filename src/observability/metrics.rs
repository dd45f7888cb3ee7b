//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define service metrics (requests, latency, backend errors, cancellations)
//! - Install the Prometheus recorder rendered at `GET /metrics`
//!
//! # Metrics
//! - `inventory_requests_total` (counter): requests by response status
//! - `inventory_request_duration_seconds` (histogram): end-to-end latency
//! - `inventory_backend_call_duration_seconds` (histogram): per-backend latency
//! - `inventory_backend_errors_total` (counter): failures by backend and kind
//! - `inventory_requests_cancelled_total` (counter): cancellations by step
//!
//! # Design Decisions
//! - Metric updates go through the `metrics` facade; without an installed
//!   recorder they are no-ops, so tests need no setup
//! - Labels are low-cardinality (status, backend, kind, step)

use std::time::Instant;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Install the global Prometheus recorder and return its render handle.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new().install_recorder()?;
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

pub fn record_request(status: u16, start: Instant) {
    metrics::counter!("inventory_requests_total", "status" => status.to_string()).increment(1);
    metrics::histogram!("inventory_request_duration_seconds")
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_call(backend: &'static str, start: Instant) {
    metrics::histogram!("inventory_backend_call_duration_seconds", "backend" => backend)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_backend_error(backend: &'static str, kind: &'static str) {
    metrics::counter!(
        "inventory_backend_errors_total",
        "backend" => backend,
        "kind" => kind
    )
    .increment(1);
}

pub fn record_cancelled(step: &'static str) {
    metrics::counter!("inventory_requests_cancelled_total", "step" => step).increment(1);
}
