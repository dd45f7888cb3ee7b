//! Response bodies and error mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::orchestrator::OrchestrationError;

/// Success body of `GET /data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HitsBody {
    pub hits: u64,
}

/// Failure body of `GET /data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub kind: String,
    pub step: String,
    pub counter_advanced: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hits: Option<u64>,
}

impl OrchestrationError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            OrchestrationError::CounterUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            OrchestrationError::LogAppendFailed { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            OrchestrationError::RequestCancelled { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for OrchestrationError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
            kind: self.kind().as_str().to_string(),
            step: self.step().as_str().to_string(),
            counter_advanced: self.counter_advanced(),
            hits: self.counter_value(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::{AppendError, CounterError};

    #[test]
    fn test_status_codes() {
        let counter = OrchestrationError::CounterUnavailable(CounterError::BackendUnavailable(
            "down".into(),
        ));
        assert_eq!(counter.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let append = OrchestrationError::LogAppendFailed {
            counter_value: 4,
            source: AppendError::ConstraintViolation("check".into()),
        };
        assert_eq!(append.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(append.into_response().status().is_server_error());
    }
}
