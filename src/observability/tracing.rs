//! Distributed tracing support.
//!
//! # Responsibilities
//! - Own the OpenTelemetry tracer provider (explicitly constructed, never global)
//! - Create the request root span and one child span per backend call
//! - Expose the trace identifier for log correlation
//! - Flush pending spans on shutdown
//!
//! # Design Decisions
//! - Export is batched and asynchronous; export failures never reach requests
//! - Without an OTLP endpoint spans are still created so trace ids exist
//! - A `RequestSpan` ends exactly once: on `close()` or, failing that, on drop

use std::fmt;

use opentelemetry::trace::{
    SpanKind, Status, TraceContextExt, TraceId, Tracer as _, TracerProvider as _,
};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::config::ObservabilityConfig;

/// Value logged in place of a trace id when no span is active.
pub const NO_TRACE: &str = "no-trace";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to build span exporter: {0}")]
    Exporter(String),
}

/// Trace id of a request, or the `no-trace` sentinel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceIdentifier(Option<TraceId>);

impl TraceIdentifier {
    pub fn none() -> Self {
        Self(None)
    }

    pub fn is_traced(&self) -> bool {
        self.0.is_some()
    }
}

impl From<&Context> for TraceIdentifier {
    fn from(cx: &Context) -> Self {
        let span = cx.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            Self(Some(span_context.trace_id()))
        } else {
            Self(None)
        }
    }
}

impl fmt::Display for TraceIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(id) => write!(f, "{}", id),
            None => f.write_str(NO_TRACE),
        }
    }
}

impl Serialize for TraceIdentifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Process tracing state, injected wherever spans are created.
pub struct TraceContext {
    provider: TracerProvider,
    tracer: Tracer,
}

impl TraceContext {
    /// Build the provider described by `config`, exporting over OTLP/gRPC
    /// when an endpoint is configured.
    pub fn init(config: &ObservabilityConfig) -> Result<Self, TelemetryError> {
        let mut builder =
            TracerProvider::builder().with_resource(resource(&config.service_name));

        if let Some(endpoint) = &config.otlp_endpoint {
            let exporter = opentelemetry_otlp::SpanExporter::builder()
                .with_tonic()
                .with_endpoint(endpoint.clone())
                .build()
                .map_err(|e| TelemetryError::Exporter(e.to_string()))?;
            builder = builder.with_batch_exporter(exporter, runtime::Tokio);
            tracing::info!(endpoint = %endpoint, "Exporting spans over OTLP");
        } else {
            tracing::info!("No OTLP endpoint configured, spans are not exported");
        }

        Ok(Self::from_provider(builder.build(), &config.service_name))
    }

    /// A provider that creates real trace ids but exports nothing.
    pub fn without_export(service_name: &str) -> Self {
        let provider = TracerProvider::builder()
            .with_resource(resource(service_name))
            .build();
        Self::from_provider(provider, service_name)
    }

    fn from_provider(provider: TracerProvider, service_name: &str) -> Self {
        let tracer = provider.tracer(service_name.to_string());
        Self { provider, tracer }
    }

    /// Start the server-side root span for one request.
    ///
    /// `remote_parent` carries any trace context extracted from the inbound
    /// request; an empty context starts a new trace.
    pub fn start_root(&self, name: &'static str, remote_parent: &Context) -> RequestSpan {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Server)
            .start_with_context(&self.tracer, remote_parent);
        RequestSpan::new(remote_parent.with_span(span))
    }

    /// Start a client span nested under `parent`.
    pub fn start_span(&self, name: &'static str, parent: &RequestSpan) -> RequestSpan {
        let span = self
            .tracer
            .span_builder(name)
            .with_kind(SpanKind::Client)
            .start_with_context(&self.tracer, &parent.cx);
        RequestSpan::new(parent.cx.with_span(span))
    }

    /// Flush pending spans and stop the exporter.
    ///
    /// Blocks until the batch processor drains; call from a blocking task.
    pub fn shutdown(&self) {
        if let Err(e) = self.provider.shutdown() {
            tracing::warn!(error = %e, "Trace provider shutdown failed");
        }
    }
}

fn resource(service_name: &str) -> Resource {
    Resource::new(vec![KeyValue::new("service.name", service_name.to_string())])
}

/// One open span plus the context that makes it current.
pub struct RequestSpan {
    cx: Context,
    closed: bool,
}

impl RequestSpan {
    fn new(cx: Context) -> Self {
        Self { cx, closed: false }
    }

    pub fn trace_id(&self) -> TraceIdentifier {
        TraceIdentifier::from(&self.cx)
    }

    pub fn set_attribute(&self, attribute: KeyValue) {
        self.cx.span().set_attribute(attribute);
    }

    /// Mark the span failed and attach the error as an event.
    pub fn set_error(&self, err: &dyn std::error::Error) {
        let span = self.cx.span();
        span.record_error(err);
        span.set_status(Status::error(err.to_string()));
    }

    /// Mark the span failed without an error value (cancellation, deadline).
    pub fn set_error_status(&self, description: &'static str) {
        self.cx.span().set_status(Status::error(description));
    }

    pub fn close(mut self) {
        self.end();
    }

    fn end(&mut self) {
        if !self.closed {
            self.closed = true;
            self.cx.span().end();
        }
    }
}

impl Drop for RequestSpan {
    fn drop(&mut self) {
        self.end();
    }
}
