//! Shared utilities for integration tests.
//!
//! Scripted backends wrap the in-memory ones: each can be told to fail with
//! a given error or to hang until the caller gives up, and counts how often
//! it was called.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use inventory_service::backends::memory::{MemoryAppendLog, MemoryCounterStore, MemoryPublisher};
use inventory_service::backends::{
    AppendError, AppendLogStore, Backends, CounterError, CounterStore, EventPublisher, LogRecord,
    PublishError,
};
use inventory_service::http::AppState;
use inventory_service::health::ReadinessProbe;
use inventory_service::observability::{MemorySink, StructuredLogger, StructuredRecord, TraceContext};
use inventory_service::orchestrator::OrchestratorSettings;
use inventory_service::{RequestOrchestrator, RequestScope};

pub const COUNTER_KEY: &str = "hits";
pub const CHANNEL: &str = "memory://test-events";
pub const SOURCE: &str = "inventory-service";

/// Failure script shared by the scripted backends.
pub struct Script<E> {
    failure: Mutex<Option<E>>,
    hang: AtomicBool,
    calls: AtomicUsize,
}

impl<E: Clone> Script<E> {
    fn new() -> Self {
        Self {
            failure: Mutex::new(None),
            hang: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn fail_with(&self, err: E) {
        *self.failure.lock().unwrap() = Some(err);
    }

    pub fn recover(&self) {
        *self.failure.lock().unwrap() = None;
        self.hang.store(false, Ordering::SeqCst);
    }

    /// Every subsequent call blocks forever.
    pub fn hang(&self) {
        self.hang.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn enter(&self) -> Result<(), E> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.hang.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn probe(&self) -> Result<(), E> {
        match self.failure.lock().unwrap().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct ScriptedCounter {
    pub store: MemoryCounterStore,
    pub script: Script<CounterError>,
}

#[async_trait]
impl CounterStore for ScriptedCounter {
    async fn increment(&self, name: &str) -> Result<u64, CounterError> {
        self.script.enter().await?;
        self.store.increment(name).await
    }

    async fn ping(&self) -> Result<(), CounterError> {
        self.script.probe()
    }
}

pub struct ScriptedAppendLog {
    pub log: MemoryAppendLog,
    pub script: Script<AppendError>,
}

#[async_trait]
impl AppendLogStore for ScriptedAppendLog {
    async fn append(&self, record: &LogRecord) -> Result<(), AppendError> {
        self.script.enter().await?;
        self.log.append(record).await
    }

    async fn ping(&self) -> Result<(), AppendError> {
        self.script.probe()
    }
}

pub struct ScriptedPublisher {
    pub publisher: MemoryPublisher,
    pub script: Script<PublishError>,
}

#[async_trait]
impl EventPublisher for ScriptedPublisher {
    async fn publish(&self, channel: &str, payload: &[u8]) -> Result<(), PublishError> {
        self.script.enter().await?;
        self.publisher.publish(channel, payload).await
    }

    async fn ping(&self, _channel: &str) -> Result<(), PublishError> {
        self.script.probe()
    }
}

/// An orchestrator over scripted backends, logging into memory.
pub struct Harness {
    pub counter: Arc<ScriptedCounter>,
    pub append_log: Arc<ScriptedAppendLog>,
    pub publisher: Arc<ScriptedPublisher>,
    pub sink: MemorySink,
    pub orchestrator: Arc<RequestOrchestrator>,
    backends: Backends,
}

impl Harness {
    pub fn new() -> Self {
        let counter = Arc::new(ScriptedCounter {
            store: MemoryCounterStore::new(),
            script: Script::new(),
        });
        let append_log = Arc::new(ScriptedAppendLog {
            log: MemoryAppendLog::new(),
            script: Script::new(),
        });
        let publisher = Arc::new(ScriptedPublisher {
            publisher: MemoryPublisher::new(),
            script: Script::new(),
        });
        let backends = Backends {
            counter: counter.clone(),
            append_log: append_log.clone(),
            publisher: publisher.clone(),
        };

        let sink = MemorySink::new();
        let orchestrator = RequestOrchestrator::new(
            backends.clone(),
            Arc::new(TraceContext::without_export("inventory-service-test")),
            Arc::new(StructuredLogger::new(Arc::new(sink.clone()))),
            OrchestratorSettings {
                counter_key: COUNTER_KEY.to_string(),
                channel: CHANNEL.to_string(),
                source: SOURCE.to_string(),
            },
        );

        Self {
            counter,
            append_log,
            publisher,
            sink,
            orchestrator: Arc::new(orchestrator),
            backends,
        }
    }

    /// A fresh scope with a generous deadline.
    pub fn scope(&self) -> RequestScope {
        RequestScope::new(CancellationToken::new(), Duration::from_secs(5))
    }

    pub fn records(&self) -> Vec<StructuredRecord> {
        self.sink.records()
    }

    /// Records as the JSON objects written to stdout.
    pub fn json_records(&self) -> Vec<serde_json::Value> {
        self.records()
            .iter()
            .map(|r| serde_json::to_value(r).unwrap())
            .collect()
    }

    pub fn counter_value(&self) -> u64 {
        self.counter.store.get(COUNTER_KEY)
    }

    pub fn appended(&self) -> usize {
        self.append_log.log.records().len()
    }

    pub fn published_hits(&self) -> Vec<u64> {
        self.publisher
            .publisher
            .published()
            .iter()
            .map(|m| {
                let body: serde_json::Value = serde_json::from_slice(&m.payload).unwrap();
                body["hits"].as_u64().unwrap()
            })
            .collect()
    }

    pub fn app_state(&self, request_timeout: Duration) -> AppState {
        AppState {
            orchestrator: self.orchestrator.clone(),
            readiness: Arc::new(ReadinessProbe::new(
                self.backends.clone(),
                CHANNEL.to_string(),
                Duration::from_millis(500),
            )),
            metrics: None,
            request_timeout,
        }
    }
}

/// Poll `condition` until it holds or a second has passed.
pub async fn wait_until(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not reached in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
