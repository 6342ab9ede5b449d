//! Timeout enforcement.
//!
//! # Responsibilities
//! - Put a deadline on outbound calls (auth endpoint, certificate download)
//! - Turn an elapsed deadline into a transient error the retry engine can act on
//!
//! # Design Decisions
//! - Uses Tokio's timeout facilities
//! - The wrapped future is dropped on expiry, cancelling the call

use std::future::Future;
use std::time::Duration;

use crate::error::{GateError, GateResult};

/// Run `fut` with a deadline. `what` names the call in the error message.
pub async fn with_deadline<T, F>(deadline: Duration, what: &str, fut: F) -> GateResult<T>
where
    F: Future<Output = GateResult<T>>,
{
    match tokio::time::timeout(deadline, fut).await {
        Ok(result) => result,
        Err(_) => {
            tracing::debug!(
                call = what,
                deadline_ms = deadline.as_millis() as u64,
                "Deadline exceeded"
            );
            Err(GateError::Transient(format!(
                "{} timed out after {:?}",
                what, deadline
            )))
        }
    }
}
