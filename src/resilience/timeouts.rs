//! Timeout and cancellation enforcement.
//!
//! # Responsibilities
//! - Wrap backend calls with the request deadline
//! - Abandon backend calls when the inbound request is cancelled
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - Cancellation is checked before the call is first polled, so an
//!   already-cancelled request never starts a side effect
//! - Interruptions are distinct from backend errors

use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a guarded call did not produce the backend's own result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interrupted<E> {
    /// The request was cancelled (e.g. client disconnected).
    Cancelled,
    /// The request deadline passed before the call finished.
    DeadlineExceeded,
    /// The backend returned an error.
    Failed(E),
}

/// Run `call` unless `cancel` fires or `deadline` passes first.
pub async fn guard<T, E, F>(
    cancel: &CancellationToken,
    deadline: Instant,
    call: F,
) -> Result<T, Interrupted<E>>
where
    F: Future<Output = Result<T, E>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Interrupted::Cancelled),
        result = tokio::time::timeout_at(deadline, call) => match result {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(Interrupted::Failed(e)),
            Err(_) => Err(Interrupted::DeadlineExceeded),
        },
    }
}
