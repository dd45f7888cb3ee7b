//! The value handed from the orchestrator to the structured logger.

use serde_json::{Map, Value};

use super::error::{OrchestrationError, PublishFailed, Step};
use crate::observability::{LogLevel, StructuredLogger, TraceIdentifier};

/// Result of one request plus everything needed to log it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub trace_id: TraceIdentifier,
    pub result: Result<u64, OrchestrationError>,
    /// Set when the best-effort publish did not go through.
    pub publish_failure: Option<PublishFailed>,
}

impl OutcomeRecord {
    pub fn counter_value(&self) -> Option<u64> {
        match &self.result {
            Ok(hits) => Some(*hits),
            Err(e) => e.counter_value(),
        }
    }

    pub fn error(&self) -> Option<&OrchestrationError> {
        self.result.as_ref().err()
    }

    /// Write this outcome to `logger`: one record per failure, plus an info
    /// record when the request succeeded.
    pub fn emit(&self, logger: &StructuredLogger) {
        if let Some(failure) = &self.publish_failure {
            let mut fields = self.base_fields();
            fields.insert("step".into(), Value::from(Step::Publish.as_str()));
            fields.insert("kind".into(), Value::from(failure.kind().as_str()));
            fields.insert("error".into(), Value::from(failure.to_string()));
            if let PublishFailed::Backend(e) = failure {
                fields.insert("error_kind".into(), Value::from(e.kind()));
            }
            logger.emit(LogLevel::Warn, "Publish failed", self.trace_id, fields);
        }

        match &self.result {
            Ok(_) => {
                logger.emit(LogLevel::Info, "Processed data", self.trace_id, self.base_fields());
            }
            Err(err) => {
                let mut fields = self.base_fields();
                fields.insert("step".into(), Value::from(err.step().as_str()));
                fields.insert("kind".into(), Value::from(err.kind().as_str()));
                fields.insert("error".into(), Value::from(err.to_string()));
                fields.insert("counter_advanced".into(), Value::from(err.counter_advanced()));
                if let OrchestrationError::LogAppendFailed { source, .. } = err {
                    fields.insert("error_kind".into(), Value::from(source.kind()));
                }

                let (level, msg) = match err {
                    OrchestrationError::CounterUnavailable(_) => {
                        (LogLevel::Error, "Counter increment failed")
                    }
                    OrchestrationError::LogAppendFailed { .. } => {
                        (LogLevel::Error, "Access log append failed")
                    }
                    OrchestrationError::RequestCancelled { .. } if err.counter_advanced() => {
                        (LogLevel::Error, "Request cancelled after counter advanced")
                    }
                    OrchestrationError::RequestCancelled { .. } => {
                        (LogLevel::Warn, "Request cancelled")
                    }
                };
                logger.emit(level, msg, self.trace_id, fields);
            }
        }
    }

    fn base_fields(&self) -> Map<String, Value> {
        let mut fields = Map::new();
        if let Some(hits) = self.counter_value() {
            fields.insert("hits".into(), Value::from(hits));
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{AppendError, CounterError, PublishError};
    use crate::observability::MemorySink;
    use std::sync::Arc;

    fn emit(outcome: &OutcomeRecord) -> Vec<serde_json::Value> {
        let sink = MemorySink::new();
        let logger = StructuredLogger::new(Arc::new(sink.clone()));
        outcome.emit(&logger);
        sink.records()
            .iter()
            .map(|r| serde_json::to_value(r).unwrap())
            .collect()
    }

    #[test]
    fn test_success_logs_single_info_record() {
        let records = emit(&OutcomeRecord {
            trace_id: TraceIdentifier::none(),
            result: Ok(3),
            publish_failure: None,
        });
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "info");
        assert_eq!(records[0]["msg"], "Processed data");
        assert_eq!(records[0]["hits"], 3);
        assert!(records[0].get("error").is_none());
    }

    #[test]
    fn test_publish_failure_adds_warning() {
        let records = emit(&OutcomeRecord {
            trace_id: TraceIdentifier::none(),
            result: Ok(5),
            publish_failure: Some(PublishFailed::Backend(PublishError::ChannelUnavailable(
                "queue missing".into(),
            ))),
        });
        assert_eq!(records.len(), 2);
        assert_eq!(records[0]["level"], "warn");
        assert_eq!(records[0]["step"], "publish");
        assert_eq!(records[0]["kind"], "publish_failed");
        assert_eq!(records[0]["error_kind"], "channel_unavailable");
        assert_eq!(records[0]["hits"], 5);
        assert_eq!(records[1]["level"], "info");
    }

    #[test]
    fn test_counter_failure_has_no_hits() {
        let records = emit(&OutcomeRecord {
            trace_id: TraceIdentifier::none(),
            result: Err(OrchestrationError::CounterUnavailable(
                CounterError::BackendUnavailable("refused".into()),
            )),
            publish_failure: None,
        });
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["level"], "error");
        assert_eq!(records[0]["kind"], "counter_unavailable");
        assert_eq!(records[0]["step"], "increment");
        assert_eq!(records[0]["counter_advanced"], false);
        assert!(records[0].get("hits").is_none());
    }

    #[test]
    fn test_append_failure_carries_counter() {
        let records = emit(&OutcomeRecord {
            trace_id: TraceIdentifier::none(),
            result: Err(OrchestrationError::LogAppendFailed {
                counter_value: 9,
                source: AppendError::ConnectionFailure("reset".into()),
            }),
            publish_failure: None,
        });
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["hits"], 9);
        assert_eq!(records[0]["counter_advanced"], true);
        assert_eq!(records[0]["error_kind"], "connection_failure");
    }
}
