//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, middleware)
//!     → request.rs (request ID, diagnostic span)
//!     → propagation.rs (traceparent → parent context)
//!     → handlers.rs (/data → orchestrator, /healthz, /metrics)
//!     → response.rs (JSON bodies, error → status mapping)
//!     → Send to client
//! ```

pub mod handlers;
pub mod propagation;
pub mod request;
pub mod response;
pub mod server;

pub use request::X_REQUEST_ID;
pub use response::{ErrorBody, HitsBody};
pub use server::{build_router, AppState, HttpServer};
