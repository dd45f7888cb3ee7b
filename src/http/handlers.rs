//! Route handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_util::sync::CancellationToken;

use crate::http::propagation::extract_parent;
use crate::http::response::HitsBody;
use crate::http::server::AppState;
use crate::observability::metrics;
use crate::orchestrator::RequestScope;

/// `GET /data`: increment, log and announce one hit.
///
/// The orchestration runs on its own task so that, if this handler is
/// dropped (client disconnect or the timeout layer), the task observes the
/// cancellation, records which step was interrupted and closes its span.
pub async fn get_data(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let start = Instant::now();
    let cancel = CancellationToken::new();
    let scope = RequestScope::new(cancel.clone(), state.request_timeout)
        .with_parent(extract_parent(&headers));
    let _cancel_on_drop = cancel.drop_guard();

    let orchestrator = state.orchestrator.clone();
    let task = tokio::spawn(async move { orchestrator.handle(scope).await });

    let response = match task.await {
        Ok(Ok(hits)) => (StatusCode::OK, Json(HitsBody { hits })).into_response(),
        Ok(Err(err)) => err.into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Orchestration task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal error" })),
            )
                .into_response()
        }
    };

    metrics::record_request(response.status().as_u16(), start);
    response
}

/// `GET /healthz`: readiness of every backend.
pub async fn healthz(State(state): State<AppState>) -> Response {
    let report = state.readiness.check().await;
    if report.ready {
        (StatusCode::OK, "ok").into_response()
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(report)).into_response()
    }
}

/// `GET /metrics`: Prometheus text exposition, 404 when metrics are disabled.
pub async fn metrics_endpoint(State(state): State<AppState>) -> Response {
    match &state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
