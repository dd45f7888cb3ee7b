//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout backstop)
//! - Bind server to listener
//! - Drain in-flight requests on shutdown

use std::sync::Arc;
use std::time::Duration;

use axum::routing::get;
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::health::ReadinessProbe;
use crate::http::handlers;
use crate::http::request::{make_request_span, request_id_header};
use crate::orchestrator::RequestOrchestrator;

/// Slack between the orchestrator's own deadline and the hard HTTP timeout,
/// so the orchestrator normally reports its deadline itself.
const TIMEOUT_BACKSTOP: Duration = Duration::from_secs(1);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<RequestOrchestrator>,
    pub readiness: Arc<ReadinessProbe>,
    /// Present when the Prometheus recorder is installed.
    pub metrics: Option<PrometheusHandle>,
    pub request_timeout: Duration,
}

/// HTTP server for the inventory service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self {
            router: build_router(state),
        }
    }

    /// Run the server until `shutdown` fires, then drain.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("HTTP server draining");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(state: AppState) -> Router {
    let hard_timeout = state.request_timeout + TIMEOUT_BACKSTOP;

    Router::new()
        .route("/data", get(handlers::get_data))
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics_endpoint))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(request_id_header(), MakeRequestUuid))
                .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
                .layer(PropagateRequestIdLayer::new(request_id_header()))
                .layer(TimeoutLayer::new(hard_timeout)),
        )
}
