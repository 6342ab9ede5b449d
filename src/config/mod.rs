//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! CONFIG_PATH (YAML or TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → shared via Arc with the token and session subsystems
//!
//! Per request:
//!     resolve.rs picks model override, else global value
//!     → missing required value becomes ConfigError::MissingField
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - Credential and certificate fields are optional; absence is reported where a value is used
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod resolve;
pub mod schema;
pub mod validation;

pub use loader::{load_config, load_from_env, ConfigError};
pub use resolve::Resolver;
pub use schema::{
    CertConfig, EasConfig, GateConfig, ModelConfig, ObservabilityConfig, ProxySettings, RetryConfig,
};
