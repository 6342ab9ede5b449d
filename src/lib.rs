//! Enterprise token gate for LLM access.
//!
//! Issues short-lived bearer tokens through a signed enterprise-auth
//! handshake, keeps the client certificate behind that handshake present
//! and valid, caches credentials per model identity, and retries
//! unreliable calls with fixed or exponential backoff.

pub mod auth;
pub mod clock;
pub mod config;
pub mod error;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod session;

pub use auth::{get_token_from_env, get_token_from_env_async, TokenService};
pub use config::schema::GateConfig;
pub use error::{Classify, ErrorKind, GateError, GateResult};
pub use resilience::{retry, retry_async, RetryPolicy, Retrying};
pub use session::{TokenBroker, uuid_from_config};
