//! Inventory service library.
//!
//! One endpoint, `GET /data`, increments a Redis counter, appends an access
//! record to Postgres and announces the new value on an SQS queue, all under
//! a single trace with one correlated JSON log record per outcome.

// Request path
pub mod backends;
pub mod http;
pub mod orchestrator;

// Cross-cutting concerns
pub mod config;
pub mod health;
pub mod lifecycle;
pub mod observability;
pub mod resilience;

pub use config::ServiceConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use orchestrator::{OrchestrationError, RequestOrchestrator, RequestScope};
