//! Request orchestration.
//!
//! # Data Flow
//! ```text
//! GET /data
//!     → RequestScope (cancellation token, deadline, remote trace parent)
//!     → root span "process-data"
//!         → counter.increment     (fatal on failure, nothing happened)
//!         → append_log.append     (fatal on failure, counter already advanced)
//!         → queue.publish         (best-effort, failure logged as warning)
//!     → OutcomeRecord → StructuredLogger
//!     → Result<hits, OrchestrationError>
//! ```
//!
//! # Design Decisions
//! - Steps run sequentially: the message carries the counter value, and the
//!   access log is written before anything is announced on the queue
//! - No in-process lock around the counter; the backend is atomic
//! - No retries
//! - Every exit path closes the root span and emits the outcome

mod error;
mod outcome;

pub use error::{FailureKind, OrchestrationError, PublishFailed, Step};
pub use outcome::OutcomeRecord;

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use opentelemetry::{Context, KeyValue};
use tokio_util::sync::CancellationToken;

use crate::backends::{
    AppendError, Backends, CounterError, LogRecord, Message, PublishError,
};
use crate::observability::{metrics, RequestSpan, StructuredLogger, TraceContext};
use crate::resilience::{guard, Interrupted};

const ROOT_SPAN: &str = "process-data";

/// Per-request execution context.
pub struct RequestScope {
    /// Fired when the inbound request is abandoned.
    pub cancel: CancellationToken,
    pub deadline: tokio::time::Instant,
    /// Trace context propagated by the caller, if any.
    pub parent: Context,
}

impl RequestScope {
    pub fn new(cancel: CancellationToken, timeout: Duration) -> Self {
        Self {
            cancel,
            deadline: tokio::time::Instant::now() + timeout,
            parent: Context::new(),
        }
    }

    pub fn with_parent(mut self, parent: Context) -> Self {
        self.parent = parent;
        self
    }
}

/// Static request parameters.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    /// Counter incremented on every request.
    pub counter_key: String,
    /// Queue the hit message is published to.
    pub channel: String,
    /// `source` field of published messages.
    pub source: String,
}

pub struct RequestOrchestrator {
    backends: Backends,
    trace: Arc<TraceContext>,
    logger: Arc<StructuredLogger>,
    settings: OrchestratorSettings,
}

impl RequestOrchestrator {
    pub fn new(
        backends: Backends,
        trace: Arc<TraceContext>,
        logger: Arc<StructuredLogger>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            backends,
            trace,
            logger,
            settings,
        }
    }

    /// Serve one request: increment, append, publish.
    ///
    /// Returns the new counter value. A failed publish is logged but does
    /// not fail the request.
    pub async fn handle(&self, scope: RequestScope) -> Result<u64, OrchestrationError> {
        let outcome = self.handle_with_outcome(scope).await;
        outcome.result
    }

    /// Like [`handle`](Self::handle) but returns the full outcome.
    pub async fn handle_with_outcome(&self, scope: RequestScope) -> OutcomeRecord {
        let root = self.trace.start_root(ROOT_SPAN, &scope.parent);
        let trace_id = root.trace_id();

        let (result, publish_failure) = match self.run(&scope, &root).await {
            Ok((hits, publish_failure)) => (Ok(hits), publish_failure),
            Err(e) => (Err(e), None),
        };

        let outcome = OutcomeRecord {
            trace_id,
            result,
            publish_failure,
        };

        if let Some(hits) = outcome.counter_value() {
            root.set_attribute(KeyValue::new("hits", hits as i64));
        }
        if let Some(err) = outcome.error() {
            root.set_error(err);
            root.set_attribute(KeyValue::new("failure.kind", err.kind().as_str()));
            root.set_attribute(KeyValue::new("failure.step", err.step().as_str()));
        }

        tracing::debug!(
            trace_id = %trace_id,
            ok = outcome.result.is_ok(),
            publish_failed = outcome.publish_failure.is_some(),
            "Request orchestrated"
        );

        outcome.emit(&self.logger);
        root.close();
        outcome
    }

    async fn run(
        &self,
        scope: &RequestScope,
        root: &RequestSpan,
    ) -> Result<(u64, Option<PublishFailed>), OrchestrationError> {
        // 1. Counter
        let counter = self.backends.counter.increment(&self.settings.counter_key);
        let hits = match self.step(Step::Increment, scope, root, counter).await {
            Ok(hits) => hits,
            Err(Interrupted::Cancelled) => {
                return Err(OrchestrationError::RequestCancelled {
                    step: Step::Increment,
                    counter_value: None,
                })
            }
            Err(Interrupted::DeadlineExceeded) => {
                return Err(OrchestrationError::CounterUnavailable(
                    CounterError::BackendUnavailable("request deadline exceeded".into()),
                ))
            }
            Err(Interrupted::Failed(e)) => return Err(OrchestrationError::CounterUnavailable(e)),
        };

        // 2. Durable access log
        let record = LogRecord::now();
        let append = self.backends.append_log.append(&record);
        match self.step(Step::Append, scope, root, append).await {
            Ok(()) => {}
            Err(Interrupted::Cancelled) => {
                return Err(OrchestrationError::RequestCancelled {
                    step: Step::Append,
                    counter_value: Some(hits),
                })
            }
            Err(Interrupted::DeadlineExceeded) => {
                return Err(OrchestrationError::LogAppendFailed {
                    counter_value: hits,
                    source: AppendError::Timeout,
                })
            }
            Err(Interrupted::Failed(source)) => {
                return Err(OrchestrationError::LogAppendFailed {
                    counter_value: hits,
                    source,
                })
            }
        }

        // 3. Best-effort publish
        let payload = Message {
            source: self.settings.source.clone(),
            hits,
        }
        .to_payload();
        let publish = self.backends.publisher.publish(&self.settings.channel, &payload);
        let publish_failure = match self.step(Step::Publish, scope, root, publish).await {
            Ok(()) => None,
            Err(Interrupted::Cancelled) => Some(PublishFailed::Cancelled),
            Err(Interrupted::DeadlineExceeded) => Some(PublishFailed::Backend(PublishError::Timeout)),
            Err(Interrupted::Failed(e)) => Some(PublishFailed::Backend(e)),
        };

        Ok((hits, publish_failure))
    }

    /// Run one backend call inside its own child span, under the request's
    /// cancellation token and deadline.
    async fn step<T, E, F>(
        &self,
        step: Step,
        scope: &RequestScope,
        root: &RequestSpan,
        call: F,
    ) -> Result<T, Interrupted<E>>
    where
        F: Future<Output = Result<T, E>>,
        E: BackendFailure,
    {
        let span = self.trace.start_span(step.span_name(), root);
        span.set_attribute(KeyValue::new("backend", step.backend()));

        let start = Instant::now();
        let result = guard(&scope.cancel, scope.deadline, call).await;
        metrics::record_backend_call(step.backend(), start);

        let outcome = match &result {
            Ok(_) => "ok",
            Err(Interrupted::Failed(e)) => {
                span.set_error(e);
                metrics::record_backend_error(step.backend(), e.kind());
                "error"
            }
            Err(Interrupted::DeadlineExceeded) => {
                span.set_error_status("request deadline exceeded");
                metrics::record_backend_error(step.backend(), "deadline_exceeded");
                "deadline_exceeded"
            }
            Err(Interrupted::Cancelled) => {
                span.set_error_status("request cancelled");
                metrics::record_cancelled(step.as_str());
                "cancelled"
            }
        };
        span.set_attribute(KeyValue::new("outcome", outcome));
        span.close();

        result
    }
}

/// Backend errors that can label metrics.
trait BackendFailure: std::error::Error {
    fn kind(&self) -> &'static str;
}

impl BackendFailure for CounterError {
    fn kind(&self) -> &'static str {
        CounterError::kind(self)
    }
}

impl BackendFailure for AppendError {
    fn kind(&self) -> &'static str {
        AppendError::kind(self)
    }
}

impl BackendFailure for PublishError {
    fn kind(&self) -> &'static str {
        PublishError::kind(self)
    }
}
