//! Model identity keys.
//!
//! Two model configurations share a cache entry exactly when they resolve to
//! the same credential variables and the same model fields.

use std::fmt;

use crate::config::{GateConfig, ModelConfig, Resolver};

/// Cache key for one model's credentials.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelIdentity(String);

impl ModelIdentity {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn from_config(config: &GateConfig, model: &ModelConfig) -> Self {
        Self(uuid_from_config(config, model))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<ModelIdentity> for String {
    fn from(identity: ModelIdentity) -> Self {
        identity.0
    }
}

/// `"{id_key}_{secret_key}_{provider}_{type}_{engine}_{model_name}_{api_version}"`.
///
/// Credential variable names follow the model-override-then-global rule;
/// every absent field renders as `None`.
pub fn uuid_from_config(config: &GateConfig, model: &ModelConfig) -> String {
    let resolver = Resolver::new(config, model);
    let field = |value: Option<&str>| value.unwrap_or("None").to_string();

    [
        field(resolver.id_key()),
        field(resolver.secret_key()),
        field(model.provider.as_deref()),
        field(model.model_type.as_deref()),
        field(model.engine.as_deref()),
        field(model.model_name.as_deref()),
        field(model.api_version.as_deref()),
    ]
    .join("_")
}
