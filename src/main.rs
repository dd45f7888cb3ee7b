//! Inventory service.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────────┐
//!                      │                  INVENTORY SERVICE                    │
//!                      │                                                       │
//!   GET /data          │  ┌─────────┐    ┌──────────────────┐                  │
//!   ───────────────────┼─▶│  http   │───▶│   orchestrator   │──┬───────────────┼──▶ Redis    INCR hits
//!                      │  │ server  │    │ (span per step)  │  ├───────────────┼──▶ Postgres INSERT access_log
//!   {"hits": n}        │  └─────────┘    └────────┬─────────┘  └───────────────┼──▶ SQS      SendMessage
//!   ◀──────────────────┼───────────────────────────┘                            │
//!                      │                                                       │
//!                      │  ┌─────────────────────────────────────────────────┐  │
//!                      │  │ config │ observability │ health │ lifecycle      │  │
//!                      │  └─────────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────────┘
//!                         stdout: JSON records   OTLP: spans   /metrics
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use inventory_service::config::{load_config, BackendMode};
use inventory_service::lifecycle::{self, signals, StartupError};
use inventory_service::observability::{logging, metrics, StructuredLogger, TraceContext};
use inventory_service::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "inventory-service")]
#[command(about = "Counts hits, logs them durably and announces them on a queue", long_about = None)]
struct Cli {
    /// TOML configuration file; environment variables override its values.
    #[arg(short, long, env = "INVENTORY_CONFIG")]
    config: Option<PathBuf>,

    /// Use in-process backends instead of Redis, Postgres and SQS.
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> Result<(), StartupError> {
    let cli = Cli::parse();

    let mode = cli.in_memory.then_some(BackendMode::Memory);
    let config = load_config(cli.config.as_deref(), mode)?;

    logging::init_subscriber(&config.observability.log_level);
    tracing::info!("inventory-service v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        mode = ?config.mode,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let trace = Arc::new(TraceContext::init(&config.observability)?);

    let metrics_handle = if config.observability.metrics_enabled {
        Some(metrics::install_recorder()?)
    } else {
        None
    };

    let backends = lifecycle::connect_backends(&config).await?;
    let state = lifecycle::build_state(
        &config,
        backends,
        trace.clone(),
        Arc::new(StructuredLogger::stdout()),
        metrics_handle,
    );

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(&shutdown);

    HttpServer::new(state).run(listener, shutdown.subscribe()).await?;

    // The batch exporter blocks while it drains.
    let flush = trace.clone();
    if let Err(e) = tokio::task::spawn_blocking(move || flush.shutdown()).await {
        tracing::warn!(error = %e, "Span flush task failed");
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
