//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Backend call from the orchestrator:
//!     → timeouts.rs (race against request cancellation and deadline)
//!     → backend client (its own per-call timeout)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - No retries: failures surface immediately to the orchestrator
//! - Client disconnection aborts outstanding work promptly

pub mod timeouts;

pub use timeouts::{guard, Interrupted};
