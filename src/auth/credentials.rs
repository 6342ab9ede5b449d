//! Consumer credential resolution and the environment-driven entry points.
//!
//! The configuration never holds credentials directly. `eas.id_key` and
//! `eas.secret_key` name environment variables, which are read through a
//! [`CredentialSource`] so callers can swap the process environment for a map.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use thiserror::Error;

use crate::auth::token::TokenService;
use crate::config::loader::{load_config, CONFIG_PATH_ENV};
use crate::config::resolve::Resolver;
use crate::config::{ConfigError, GateConfig};
use crate::error::GateResult;

/// Error type for credential resolution.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Environment variable id key \"{var}\" not set for model index {index}")]
    MissingId { var: String, index: String },

    #[error("Environment variable secret key \"{var}\" not set for model index {index}")]
    MissingSecret { var: String, index: String },

    #[error("Consumer secret is not valid base64: {0}")]
    InvalidSecret(String),
}

/// Where named variables are looked up.
pub trait CredentialSource: Send + Sync {
    fn var(&self, name: &str) -> Option<String>;
}

/// The process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnv;

impl CredentialSource for ProcessEnv {
    fn var(&self, name: &str) -> Option<String> {
        std::env::var(name).ok()
    }
}

impl CredentialSource for HashMap<String, String> {
    fn var(&self, name: &str) -> Option<String> {
        self.get(name).cloned()
    }
}

/// Resolved consumer id and base64 secret.
#[derive(Clone, PartialEq, Eq)]
pub struct ConsumerCredentials {
    pub consumer_id: String,
    pub consumer_secret: String,
}

impl fmt::Debug for ConsumerCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConsumerCredentials")
            .field("consumer_id", &self.consumer_id)
            .field("consumer_secret", &"<redacted>")
            .finish()
    }
}

/// Read the consumer id and secret for the model at `index`.
///
/// Variable names follow the model-override-then-global rule. An unset name
/// renders as `None` in the error, the same way identities render it.
pub fn resolve_credentials(
    config: &GateConfig,
    index: &str,
    source: &dyn CredentialSource,
) -> GateResult<ConsumerCredentials> {
    let model = config.model(index)?;
    let resolver = Resolver::new(config, model);

    let id_var = resolver.id_key().unwrap_or("None");
    let consumer_id = source.var(id_var).ok_or_else(|| CredentialError::MissingId {
        var: id_var.to_string(),
        index: index.to_string(),
    })?;

    let secret_var = resolver.secret_key().unwrap_or("None");
    let consumer_secret = source
        .var(secret_var)
        .ok_or_else(|| CredentialError::MissingSecret {
            var: secret_var.to_string(),
            index: index.to_string(),
        })?;

    Ok(ConsumerCredentials {
        consumer_id,
        consumer_secret,
    })
}

/// Load the configuration named by `CONFIG_PATH` in `source`.
pub fn load_config_from(source: &dyn CredentialSource) -> Result<GateConfig, ConfigError> {
    let path = source
        .var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .ok_or(ConfigError::MissingConfigPath)?;
    load_config(&path)
}

/// Bearer token for the model at `index`, using only the process environment.
///
/// Blocks the calling thread; must not be called from inside a Tokio runtime.
pub fn get_token_from_env(index: &str) -> GateResult<String> {
    get_token_from_source(&ProcessEnv, index)
}

/// Async counterpart of [`get_token_from_env`].
pub async fn get_token_from_env_async(index: &str) -> GateResult<String> {
    get_token_from_source_async(&ProcessEnv, index).await
}

/// [`get_token_from_env`] with an explicit variable source.
pub fn get_token_from_source(source: &dyn CredentialSource, index: &str) -> GateResult<String> {
    let config = Arc::new(load_config_from(source)?);
    let credentials = resolve_credentials(&config, index, source)?;
    let model = config.model(index)?.clone();

    TokenService::from_config(credentials, config)?.get_token_blocking(&model)
}

/// [`get_token_from_env_async`] with an explicit variable source.
pub async fn get_token_from_source_async(
    source: &dyn CredentialSource,
    index: &str,
) -> GateResult<String> {
    let config = Arc::new(load_config_from(source)?);
    let credentials = resolve_credentials(&config, index, source)?;
    let model = config.model(index)?.clone();

    TokenService::from_config(credentials, config)?
        .get_token(&model)
        .await
}
