//! Session subsystem.
//!
//! # Data Flow
//! ```text
//! GateConfig + ModelConfig
//!     → identity.rs (deterministic ModelIdentity key)
//!     → cache.rs (TTL check, single issuance per key)
//!     → broker.rs (token service behind the retry engine on miss)
//!     → Arc<ModelHandle> (bearer credential + endpoint settings)
//! ```
//!
//! # Design Decisions
//! - The cache is owned by the broker; there is no process-wide instance
//! - TTL comes from `eas.token_refresh_interval` (900 s when unset)
//! - Cache hits skip the certificate check and the network entirely

pub mod broker;
pub mod cache;
pub mod identity;

pub use broker::{BrokerDeps, Credential, ModelHandle, ModelKind, TokenBroker};
pub use cache::{Lookup, SessionCache};
pub use identity::{uuid_from_config, ModelIdentity};
