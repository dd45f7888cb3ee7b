//! Startup orchestration.
//!
//! # Responsibilities
//! - Construct the backend clients for the configured mode
//! - Assemble the orchestrator, readiness probe and handler state
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;
use std::time::Duration;

use metrics_exporter_prometheus::PrometheusHandle;
use thiserror::Error;

use crate::backends::memory::{MemoryAppendLog, MemoryCounterStore, MemoryPublisher};
use crate::backends::postgres::PgAppendLog;
use crate::backends::redis_counter::RedisCounterStore;
use crate::backends::sqs::SqsPublisher;
use crate::backends::{AppendError, Backends, CounterError};
use crate::config::{BackendMode, ConfigError, ServiceConfig};
use crate::health::ReadinessProbe;
use crate::http::AppState;
use crate::observability::{StructuredLogger, TelemetryError, TraceContext};
use crate::orchestrator::{OrchestratorSettings, RequestOrchestrator};

/// Channel name used by the in-memory publisher when no queue URL is set.
const MEMORY_CHANNEL: &str = "memory://inventory-events";

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("telemetry: {0}")]
    Telemetry(#[from] TelemetryError),

    #[error("metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("counter store: {0}")]
    Counter(#[from] CounterError),

    #[error("append log: {0}")]
    AppendLog(#[from] AppendError),

    #[error("listener: {0}")]
    Io(#[from] std::io::Error),
}

/// Connect to every backend named by `config`.
pub async fn connect_backends(config: &ServiceConfig) -> Result<Backends, StartupError> {
    let backend_timeout = Duration::from_secs(config.timeouts.backend_secs);

    let backends = match config.mode {
        BackendMode::Memory => {
            tracing::warn!("Running with in-memory backends; nothing is persisted");
            Backends {
                counter: Arc::new(MemoryCounterStore::new()),
                append_log: Arc::new(MemoryAppendLog::new()),
                publisher: Arc::new(MemoryPublisher::new()),
            }
        }
        BackendMode::Live => {
            let counter = RedisCounterStore::connect(&config.counter.url, backend_timeout).await?;
            let append_log = PgAppendLog::connect(&config.append_log, backend_timeout).await?;
            let publisher = SqsPublisher::from_config(&config.queue, backend_timeout).await;
            Backends {
                counter: Arc::new(counter),
                append_log: Arc::new(append_log),
                publisher: Arc::new(publisher),
            }
        }
    };

    Ok(backends)
}

/// Queue the orchestrator publishes to.
pub fn channel(config: &ServiceConfig) -> String {
    if config.queue.queue_url.is_empty() && config.mode == BackendMode::Memory {
        MEMORY_CHANNEL.to_string()
    } else {
        config.queue.queue_url.clone()
    }
}

/// Wire connected backends into handler state.
pub fn build_state(
    config: &ServiceConfig,
    backends: Backends,
    trace: Arc<TraceContext>,
    logger: Arc<StructuredLogger>,
    metrics: Option<PrometheusHandle>,
) -> AppState {
    let channel = channel(config);
    let settings = OrchestratorSettings {
        counter_key: config.counter.key.clone(),
        channel: channel.clone(),
        source: config.queue.source.clone(),
    };

    let readiness = ReadinessProbe::new(
        backends.clone(),
        channel,
        Duration::from_secs(config.timeouts.backend_secs),
    );
    let orchestrator = RequestOrchestrator::new(backends, trace, logger, settings);

    AppState {
        orchestrator: Arc::new(orchestrator),
        readiness: Arc::new(readiness),
        metrics,
        request_timeout: Duration::from_secs(config.timeouts.request_secs),
    }
}
