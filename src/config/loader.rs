//! Configuration loading from disk.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::schema::GateConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_ENV: &str = "CONFIG_PATH";

/// Error type for configuration loading and resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("CONFIG_PATH environment variable not set")]
    MissingConfigPath,

    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("No models defined in config")]
    NoModels,

    #[error("Model config at index \"{index}\" is not defined")]
    UndefinedModel { index: String },

    #[error("Required field \"{0}\" is not set in the model or global config")]
    MissingField(&'static str),

    #[error("Provider \"{0}\" is not supported")]
    UnsupportedProvider(String),

    #[error("Invalid proxy settings: {0}")]
    Proxy(String),

    #[error("HTTP client error: {0}")]
    HttpClient(String),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// On-disk configuration format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    /// `.toml` files are TOML, everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => ConfigFormat::Toml,
            _ => ConfigFormat::Yaml,
        }
    }
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str, format: ConfigFormat) -> Result<GateConfig, ConfigError> {
    let config: GateConfig = match format {
        ConfigFormat::Yaml => serde_yaml::from_str(content)?,
        ConfigFormat::Toml => toml::from_str(content)?,
    };

    validate_config(&config).map_err(ConfigError::Validation)?;

    Ok(config)
}

/// Load and validate configuration from a YAML or TOML file.
pub fn load_config(path: &Path) -> Result<GateConfig, ConfigError> {
    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let config = parse_config(&content, ConfigFormat::from_path(path))?;

    tracing::debug!(
        path = %path.display(),
        models = config.models.as_ref().map(|m| m.len()).unwrap_or(0),
        "Configuration loaded"
    );
    Ok(config)
}

/// Path named by `CONFIG_PATH`.
pub fn config_path_from_env() -> Result<PathBuf, ConfigError> {
    std::env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .ok_or(ConfigError::MissingConfigPath)
}

/// Load the configuration named by `CONFIG_PATH`.
pub fn load_from_env() -> Result<GateConfig, ConfigError> {
    load_config(&config_path_from_env()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const YAML: &str = r#"
eas:
  id_key: CONSUMER_ID
  secret_key: CONSUMER_SECRET
  url: https://eas.example.com/token
  scope:
    - "/llm/**::post"
  originator_source: test-suite
  token_refresh_interval: 100
cert:
  cert_path: https://certs.example.com/ca.pem
  cert_name: ca.pem
  cert_size: 1938
retry:
  max_retry: 5
  ebo: true
  retry_on: [transient, auth_service]
models:
  "1":
    provider: openai
    type: chat
    engine: engine
    model_name: test_model
    api_version: api_version
  "2":
    provider: openai
    type: azure
    eas:
      id_key: OTHER_ID
"#;

    #[test]
    fn test_parse_yaml() {
        let config = parse_config(YAML, ConfigFormat::Yaml).unwrap();
        assert_eq!(config.eas.id_key.as_deref(), Some("CONSUMER_ID"));
        assert_eq!(config.cert.cert_size, Some(1938));
        assert_eq!(config.retry.max_retry, 5);
        assert!(config.retry.ebo);
        assert_eq!(config.retry.retry_on, vec![ErrorKind::Transient, ErrorKind::AuthService]);
        // unspecified retry field keeps its default
        assert_eq!(config.retry.sleep_time_ms, 1000);

        let models = config.models.as_ref().unwrap();
        assert_eq!(models.len(), 2);
        assert_eq!(models["2"].eas.as_ref().unwrap().id_key.as_deref(), Some("OTHER_ID"));
    }

    #[test]
    fn test_parse_toml() {
        let content = r#"
[eas]
id_key = "CONSUMER_ID"
url = "https://eas.example.com/token"

[models.1]
provider = "openai"
type = "chat"
"#;
        let config = parse_config(content, ConfigFormat::Toml).unwrap();
        assert_eq!(config.eas.id_key.as_deref(), Some("CONSUMER_ID"));
        assert_eq!(config.model("1").unwrap().model_type.as_deref(), Some("chat"));
    }

    #[test]
    fn test_missing_vs_empty_models() {
        let config = parse_config("eas: {}\n", ConfigFormat::Yaml).unwrap();
        assert!(config.models.is_none());

        let config = parse_config("models: {}\n", ConfigFormat::Yaml).unwrap();
        assert_eq!(config.models.map(|m| m.len()), Some(0));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(ConfigFormat::from_path(Path::new("gate.toml")), ConfigFormat::Toml);
        assert_eq!(ConfigFormat::from_path(Path::new("gate.yml")), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::from_path(Path::new("gate")), ConfigFormat::Yaml);
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_config(Path::new("/nonexistent/chaingate.yml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_validation_errors_are_reported() {
        let err = parse_config("eas:\n  url: not a url\n", ConfigFormat::Yaml).unwrap_err();
        assert!(err.to_string().starts_with("Validation failed"));
        assert!(err.to_string().contains("eas.url"));
    }
}
