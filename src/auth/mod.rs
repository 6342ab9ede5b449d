//! Token acquisition subsystem.
//!
//! # Data Flow
//! ```text
//! CONFIG_PATH + env (credentials.rs)
//!     → ConsumerCredentials (id, base64 secret)
//!     → token.rs
//!         → certificate.rs (download / size / expiry, only when the file is missing)
//!         → signature.rs (correlation id, timestamp, HMAC signature)
//!         → transport.rs (signed POST to the auth endpoint)
//!     → "Bearer {token}" or AuthService error
//! ```
//!
//! # Design Decisions
//! - Credentials are never stored in config, only the names of the variables holding them
//! - No retry at this layer; callers wrap the service with `resilience::Retrying`
//! - The auth transport is a trait so tests can replace the network

pub mod certificate;
pub mod credentials;
pub mod signature;
pub mod token;
pub mod transport;

pub use certificate::{CertificateError, CertificateManager};
pub use credentials::{
    get_token_from_env, get_token_from_env_async, resolve_credentials, ConsumerCredentials,
    CredentialError, CredentialSource, ProcessEnv,
};
pub use token::TokenService;
pub use transport::{AuthResponse, AuthTransport, HttpTransport};
