//! Model-override-then-global field resolution.
//!
//! Every `eas`/`cert` field follows the same rule: the model's own value
//! wins, otherwise the global value is used, otherwise the field is absent.
//! Callers that cannot proceed without a value go through [`require`].

use crate::config::loader::ConfigError;
use crate::config::schema::{GateConfig, ModelConfig, ProxySettings};

/// Pick the model field if present, else the global one.
pub fn resolve<'a, T: ?Sized>(
    model_field: Option<&'a T>,
    global_field: Option<&'a T>,
) -> Option<&'a T> {
    model_field.or(global_field)
}

/// Turn an absent resolved value into a configuration error naming the field.
pub fn require<T>(value: Option<T>, field: &'static str) -> Result<T, ConfigError> {
    value.ok_or(ConfigError::MissingField(field))
}

/// Resolved view over one model and the global configuration.
#[derive(Debug, Clone, Copy)]
pub struct Resolver<'a> {
    config: &'a GateConfig,
    model: &'a ModelConfig,
}

impl<'a> Resolver<'a> {
    pub fn new(config: &'a GateConfig, model: &'a ModelConfig) -> Self {
        Self { config, model }
    }

    pub fn model(&self) -> &'a ModelConfig {
        self.model
    }

    pub fn id_key(&self) -> Option<&'a str> {
        resolve(
            self.model.eas.as_ref().and_then(|e| e.id_key.as_deref()),
            self.config.eas.id_key.as_deref(),
        )
    }

    pub fn secret_key(&self) -> Option<&'a str> {
        resolve(
            self.model.eas.as_ref().and_then(|e| e.secret_key.as_deref()),
            self.config.eas.secret_key.as_deref(),
        )
    }

    pub fn eas_url(&self) -> Option<&'a str> {
        resolve(
            self.model.eas.as_ref().and_then(|e| e.url.as_deref()),
            self.config.eas.url.as_deref(),
        )
    }

    pub fn scope(&self) -> Option<&'a [String]> {
        resolve(
            self.model.eas.as_ref().and_then(|e| e.scope.as_deref()),
            self.config.eas.scope.as_deref(),
        )
    }

    pub fn originator_source(&self) -> Option<&'a str> {
        resolve(
            self.model.eas.as_ref().and_then(|e| e.originator_source.as_deref()),
            self.config.eas.originator_source.as_deref(),
        )
    }

    pub fn cert_path(&self) -> Option<&'a str> {
        resolve(
            self.model.cert.as_ref().and_then(|c| c.cert_path.as_deref()),
            self.config.cert.cert_path.as_deref(),
        )
    }

    pub fn cert_name(&self) -> Option<&'a str> {
        resolve(
            self.model.cert.as_ref().and_then(|c| c.cert_name.as_deref()),
            self.config.cert.cert_name.as_deref(),
        )
    }

    pub fn cert_size(&self) -> Option<u64> {
        resolve(
            self.model.cert.as_ref().and_then(|c| c.cert_size.as_ref()),
            self.config.cert.cert_size.as_ref(),
        )
        .copied()
    }

    pub fn proxy(&self) -> Option<&'a ProxySettings> {
        resolve(self.model.proxy.as_ref(), self.config.proxy.as_ref())
    }
}
