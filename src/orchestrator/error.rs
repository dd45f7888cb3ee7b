//! Orchestration error taxonomy.

use std::fmt;

use thiserror::Error;

use crate::backends::{AppendError, CounterError, PublishError};

/// The three backend steps of a request, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Increment,
    Append,
    Publish,
}

impl Step {
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Increment => "increment",
            Step::Append => "append",
            Step::Publish => "publish",
        }
    }

    /// Backend label used for metrics and span attributes.
    pub fn backend(&self) -> &'static str {
        match self {
            Step::Increment => "counter",
            Step::Append => "append_log",
            Step::Publish => "queue",
        }
    }

    pub fn span_name(&self) -> &'static str {
        match self {
            Step::Increment => "counter.increment",
            Step::Append => "append_log.append",
            Step::Publish => "queue.publish",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure classes written to log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    CounterUnavailable,
    LogAppendFailed,
    PublishFailed,
    RequestCancelled,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::CounterUnavailable => "counter_unavailable",
            FailureKind::LogAppendFailed => "log_append_failed",
            FailureKind::PublishFailed => "publish_failed",
            FailureKind::RequestCancelled => "request_cancelled",
        }
    }
}

/// A failure that fails the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestrationError {
    /// Nothing happened: the counter did not advance.
    #[error("{0}")]
    CounterUnavailable(#[source] CounterError),

    /// The counter advanced to `counter_value` but no access log row exists.
    #[error("counter advanced to {counter_value} but was not durably logged: {source}")]
    LogAppendFailed {
        counter_value: u64,
        #[source]
        source: AppendError,
    },

    /// The inbound request went away. `counter_value` is set when the
    /// counter had already advanced.
    #[error("request cancelled during {step}")]
    RequestCancelled {
        step: Step,
        counter_value: Option<u64>,
    },
}

impl OrchestrationError {
    pub fn kind(&self) -> FailureKind {
        match self {
            OrchestrationError::CounterUnavailable(_) => FailureKind::CounterUnavailable,
            OrchestrationError::LogAppendFailed { .. } => FailureKind::LogAppendFailed,
            OrchestrationError::RequestCancelled { .. } => FailureKind::RequestCancelled,
        }
    }

    /// The step that failed.
    pub fn step(&self) -> Step {
        match self {
            OrchestrationError::CounterUnavailable(_) => Step::Increment,
            OrchestrationError::LogAppendFailed { .. } => Step::Append,
            OrchestrationError::RequestCancelled { step, .. } => *step,
        }
    }

    /// Counter value already consumed by this request, if any.
    pub fn counter_value(&self) -> Option<u64> {
        match self {
            OrchestrationError::CounterUnavailable(_) => None,
            OrchestrationError::LogAppendFailed { counter_value, .. } => Some(*counter_value),
            OrchestrationError::RequestCancelled { counter_value, .. } => *counter_value,
        }
    }

    /// True when the counter moved but the access log did not record it.
    pub fn counter_advanced(&self) -> bool {
        self.counter_value().is_some()
    }
}

/// A failed publish. Never fails the request.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublishFailed {
    #[error("{0}")]
    Backend(#[source] PublishError),

    #[error("request cancelled before publish completed")]
    Cancelled,
}

impl PublishFailed {
    pub fn kind(&self) -> FailureKind {
        match self {
            PublishFailed::Backend(_) => FailureKind::PublishFailed,
            PublishFailed::Cancelled => FailureKind::RequestCancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_failure_reports_consumed_counter() {
        let err = OrchestrationError::LogAppendFailed {
            counter_value: 5,
            source: AppendError::Timeout,
        };
        assert_eq!(err.kind(), FailureKind::LogAppendFailed);
        assert_eq!(err.step(), Step::Append);
        assert_eq!(err.counter_value(), Some(5));
        assert!(err.counter_advanced());
        assert_eq!(
            err.to_string(),
            "counter advanced to 5 but was not durably logged: append log timed out"
        );
    }

    #[test]
    fn test_counter_failure_has_no_side_effect() {
        let err = OrchestrationError::CounterUnavailable(CounterError::BackendUnavailable(
            "connection refused".into(),
        ));
        assert_eq!(err.step(), Step::Increment);
        assert!(!err.counter_advanced());
    }

    #[test]
    fn test_cancellation_between_steps() {
        let before = OrchestrationError::RequestCancelled {
            step: Step::Increment,
            counter_value: None,
        };
        let between = OrchestrationError::RequestCancelled {
            step: Step::Append,
            counter_value: Some(3),
        };
        assert!(!before.counter_advanced());
        assert!(between.counter_advanced());
        assert_eq!(between.to_string(), "request cancelled during append");
    }
}
