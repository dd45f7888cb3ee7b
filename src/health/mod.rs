//! Health checking subsystem.
//!
//! # Data Flow
//! ```text
//! GET /healthz
//!     → readiness.rs (probe counter, append log, queue concurrently)
//!     → 200 "ok" | 503 with a per-backend report
//! ```
//!
//! # Design Decisions
//! - Probes run on demand, not on a timer; the orchestrator never consults them
//! - Each probe has its own timeout so one hung backend cannot stall the rest

pub mod readiness;

pub use readiness::{BackendCheck, ReadinessProbe, ReadinessReport};
