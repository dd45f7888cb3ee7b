//! Readiness probing.
//!
//! # Responsibilities
//! - Probe every backend the request path depends on
//! - Report which ones failed and why

use std::time::Duration;

use serde::Serialize;

use crate::backends::Backends;

/// Result of probing one backend.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct BackendCheck {
    pub backend: &'static str,
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ReadinessReport {
    pub ready: bool,
    pub checks: Vec<BackendCheck>,
}

pub struct ReadinessProbe {
    backends: Backends,
    channel: String,
    timeout: Duration,
}

impl ReadinessProbe {
    pub fn new(backends: Backends, channel: String, timeout: Duration) -> Self {
        Self {
            backends,
            channel,
            timeout,
        }
    }

    /// Probe all three backends concurrently.
    pub async fn check(&self) -> ReadinessReport {
        let (counter, append_log, queue) = tokio::join!(
            self.probe("counter", self.backends.counter.ping()),
            self.probe("append_log", self.backends.append_log.ping()),
            self.probe("queue", self.backends.publisher.ping(&self.channel)),
        );

        let checks = vec![counter, append_log, queue];
        let ready = checks.iter().all(|c| c.healthy);
        if !ready {
            tracing::warn!(
                failing = ?checks.iter().filter(|c| !c.healthy).map(|c| c.backend).collect::<Vec<_>>(),
                "Readiness check failed"
            );
        }
        ReadinessReport { ready, checks }
    }

    async fn probe<F, E>(&self, backend: &'static str, ping: F) -> BackendCheck
    where
        F: std::future::Future<Output = Result<(), E>>,
        E: std::fmt::Display,
    {
        let error = match tokio::time::timeout(self.timeout, ping).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some("probe timed out".to_string()),
        };

        BackendCheck {
            backend,
            healthy: error.is_none(),
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::memory::{MemoryAppendLog, MemoryCounterStore, MemoryPublisher};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_memory_backends_are_ready() {
        let backends = Backends {
            counter: Arc::new(MemoryCounterStore::new()),
            append_log: Arc::new(MemoryAppendLog::new()),
            publisher: Arc::new(MemoryPublisher::new()),
        };
        let probe = ReadinessProbe::new(backends, "events".into(), Duration::from_secs(1));

        let report = probe.check().await;
        assert!(report.ready);
        assert_eq!(report.checks.len(), 3);
        assert!(report.checks.iter().all(|c| c.error.is_none()));
    }
}
