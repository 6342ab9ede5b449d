//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! Every credential and certificate field is optional at this level: models
//! may override any `eas`/`cert` field, and absence is only an error at the
//! point where a value is actually needed (see `config::resolve`).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::config::loader::ConfigError;
use crate::error::ErrorKind;

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Global enterprise-auth settings.
    pub eas: EasConfig,

    /// Global client certificate settings.
    pub cert: CertConfig,

    /// Model definitions keyed by index. `None` when the key is absent.
    pub models: Option<BTreeMap<String, ModelConfig>>,

    /// Global outbound proxy for model traffic.
    pub proxy: Option<ProxySettings>,

    /// Retry policy applied around token issuance.
    pub retry: RetryConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl GateConfig {
    /// Look up the model at `index`.
    pub fn model(&self, index: &str) -> Result<&ModelConfig, ConfigError> {
        let models = self.models.as_ref().ok_or(ConfigError::NoModels)?;
        models.get(index).ok_or_else(|| ConfigError::UndefinedModel {
            index: index.to_string(),
        })
    }

    /// Session TTL in seconds.
    pub fn token_refresh_interval(&self) -> u64 {
        self.eas
            .token_refresh_interval
            .unwrap_or(DEFAULT_TOKEN_REFRESH_SECS)
    }
}

/// Default session TTL (15 minutes).
pub const DEFAULT_TOKEN_REFRESH_SECS: u64 = 900;

/// Enterprise auth service settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct EasConfig {
    /// Name of the environment variable holding the consumer id.
    pub id_key: Option<String>,

    /// Name of the environment variable holding the base64 consumer secret.
    pub secret_key: Option<String>,

    /// Token endpoint URL.
    pub url: Option<String>,

    /// Scopes requested for the token.
    pub scope: Option<Vec<String>>,

    /// `originator_source` claim.
    pub originator_source: Option<String>,

    /// Session TTL in seconds.
    pub token_refresh_interval: Option<u64>,
}

/// Client certificate settings.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CertConfig {
    /// URL the PEM certificate is downloaded from.
    pub cert_path: Option<String>,

    /// Local file the certificate is stored in.
    pub cert_name: Option<String>,

    /// Expected size of the certificate file in bytes.
    pub cert_size: Option<u64>,
}

/// A single model definition.
#[derive(Debug, Clone, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct ModelConfig {
    /// Per-model auth overrides.
    pub eas: Option<EasConfig>,

    /// Per-model certificate overrides.
    pub cert: Option<CertConfig>,

    pub provider: Option<String>,

    /// `chat` or anything else (completion).
    #[serde(rename = "type")]
    pub model_type: Option<String>,

    pub engine: Option<String>,

    pub model_name: Option<String>,

    pub api_base: Option<String>,

    pub api_version: Option<String>,

    /// Per-model proxy override.
    pub proxy: Option<ProxySettings>,
}

/// Outbound HTTP proxy.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ProxySettings {
    pub host: String,
    pub port: u16,
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (0 and 1 both mean a single attempt).
    pub max_retry: u32,

    /// Base delay between attempts in milliseconds.
    pub sleep_time_ms: u64,

    /// Double the delay after each failed attempt.
    pub ebo: bool,

    /// Error kinds eligible for retry.
    pub retry_on: Vec<ErrorKind>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retry: 3,
            sleep_time_ms: 1000,
            ebo: false,
            retry_on: vec![ErrorKind::Transient],
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json: bool,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
