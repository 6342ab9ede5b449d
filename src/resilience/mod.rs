//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call (token request, certificate download):
//!     → timeouts.rs (deadline per call)
//!     → On failure: retries.rs (classify, retry with backoff.rs delays)
//!     → Exhausted or non-retryable: error returned to the caller unchanged
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - Retry eligibility is decided by `ErrorKind`, never by error type
//! - Sync and async engines share one decision function
//! - Wrapping a collaborator keeps its call signature (`Retrying<S>`)

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{retry, retry_async, AsyncInvoke, Invoke, RetryPolicy, Retrying};
