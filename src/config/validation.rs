//! Configuration validation.
//!
//! Serde handles syntax; this module checks values that would only fail
//! later, at token time. Required-field presence is left to resolution time,
//! since any field may come from a model override.
//!
//! Returns all validation errors, not just the first.

use std::net::SocketAddr;

use crate::config::schema::{CertConfig, EasConfig, GateConfig, ProxySettings};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Validate the whole configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_eas(&config.eas, "eas", &mut errors);
    check_cert(&config.cert, "cert", &mut errors);
    if let Some(proxy) = &config.proxy {
        check_proxy(proxy, "proxy", &mut errors);
    }

    if let Some(models) = &config.models {
        for (index, model) in models {
            if let Some(eas) = &model.eas {
                check_eas(eas, &format!("models.{index}.eas"), &mut errors);
            }
            if let Some(cert) = &model.cert {
                check_cert(cert, &format!("models.{index}.cert"), &mut errors);
            }
            if let Some(proxy) = &model.proxy {
                check_proxy(proxy, &format!("models.{index}.proxy"), &mut errors);
            }
        }
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_eas(eas: &EasConfig, prefix: &str, errors: &mut Vec<ValidationError>) {
    if let Some(url) = &eas.url {
        check_url(url, &format!("{prefix}.url"), errors);
    }
    if let Some(scope) = &eas.scope {
        if scope.is_empty() {
            errors.push(ValidationError::new(format!("{prefix}.scope"), "must not be empty"));
        }
    }
}

fn check_cert(cert: &CertConfig, prefix: &str, errors: &mut Vec<ValidationError>) {
    if let Some(path) = &cert.cert_path {
        check_url(path, &format!("{prefix}.cert_path"), errors);
    }
    if let Some(name) = &cert.cert_name {
        if name.trim().is_empty() {
            errors.push(ValidationError::new(format!("{prefix}.cert_name"), "must not be empty"));
        }
    }
    if cert.cert_size == Some(0) {
        errors.push(ValidationError::new(format!("{prefix}.cert_size"), "must be greater than 0"));
    }
}

fn check_proxy(proxy: &ProxySettings, prefix: &str, errors: &mut Vec<ValidationError>) {
    if proxy.host.trim().is_empty() {
        errors.push(ValidationError::new(format!("{prefix}.host"), "must not be empty"));
    }
    if proxy.port == 0 {
        errors.push(ValidationError::new(format!("{prefix}.port"), "must not be 0"));
    }
}

fn check_url(value: &str, field: &str, errors: &mut Vec<ValidationError>) {
    match url::Url::parse(value) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
        Ok(parsed) => errors.push(ValidationError::new(
            field,
            format!("unsupported scheme '{}'", parsed.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new(field, format!("invalid URL: {e}"))),
    }
}
