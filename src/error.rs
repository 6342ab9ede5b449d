//! Error taxonomy shared by every subsystem.
//!
//! Each subsystem keeps its own error enum (`ConfigError`, `CredentialError`,
//! `CertificateError`); `GateError` folds them together and tags every
//! failure with an [`ErrorKind`]. Retry policies filter on the kind, never on
//! the concrete type.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::auth::certificate::CertificateError;
use crate::auth::credentials::CredentialError;
use crate::config::loader::ConfigError;

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Static misconfiguration: missing config, models or required fields.
    Configuration,
    /// Consumer id or secret could not be resolved.
    Credential,
    /// Certificate download, integrity or expiry failure.
    Certificate,
    /// The auth endpoint answered with a non-200 status.
    AuthService,
    /// Network timeout or connection failure.
    Transient,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Credential => "credential",
            ErrorKind::Certificate => "certificate",
            ErrorKind::AuthService => "auth_service",
            ErrorKind::Transient => "transient",
        };
        f.write_str(name)
    }
}

/// Anything the retry engine can classify.
pub trait Classify {
    fn kind(&self) -> ErrorKind;
}

/// Errors surfaced by the token and session subsystems.
#[derive(Debug, Error)]
pub enum GateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Credential(#[from] CredentialError),

    #[error(transparent)]
    Certificate(#[from] CertificateError),

    /// Non-200 answer from the auth endpoint, carrying its description verbatim.
    #[error("{0}")]
    AuthService(String),

    #[error("Transient failure: {0}")]
    Transient(String),
}

impl Classify for GateError {
    fn kind(&self) -> ErrorKind {
        match self {
            GateError::Config(_) => ErrorKind::Configuration,
            GateError::Credential(_) => ErrorKind::Credential,
            GateError::Certificate(_) => ErrorKind::Certificate,
            GateError::AuthService(_) => ErrorKind::AuthService,
            GateError::Transient(_) => ErrorKind::Transient,
        }
    }
}

impl From<reqwest::Error> for GateError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            GateError::Config(ConfigError::HttpClient(err.to_string()))
        } else if err.is_decode() {
            GateError::AuthService(format!("Malformed auth response: {}", err))
        } else {
            // timeouts, refused connections, resets, truncated bodies
            GateError::Transient(err.to_string())
        }
    }
}

/// Result type for gate operations.
pub type GateResult<T> = Result<T, GateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(GateError::AuthService("x".into()).kind(), ErrorKind::AuthService);
        assert_eq!(GateError::Transient("x".into()).kind(), ErrorKind::Transient);
        assert_eq!(GateError::from(ConfigError::NoModels).kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_error_display() {
        let err = GateError::AuthService("bad signature".into());
        assert_eq!(err.to_string(), "bad signature");

        let err = GateError::from(ConfigError::NoModels);
        assert_eq!(err.to_string(), "No models defined in config");
    }

    #[test]
    fn test_kind_deserializes_snake_case() {
        let kinds: Vec<ErrorKind> =
            serde_json::from_str(r#"["transient", "auth_service"]"#).unwrap();
        assert_eq!(kinds, vec![ErrorKind::Transient, ErrorKind::AuthService]);
        assert_eq!(ErrorKind::AuthService.to_string(), "auth_service");
    }
}
