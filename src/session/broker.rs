//! Token broker: the entry point applications use.
//!
//! # Data Flow
//! ```text
//! model index
//!     → GateConfig::model (NoModels / UndefinedModel)
//!     → ModelIdentity
//!     → SessionCache::get_or_issue
//!         hit:  cached ModelHandle (no certificate check, no network)
//!         miss: credentials → Retrying<TokenService> → ModelHandle cached
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::auth::certificate::CertificateManager;
use crate::auth::credentials::{resolve_credentials, CredentialSource, ProcessEnv};
use crate::auth::token::{TokenService, TOKEN_REQUEST_TIMEOUT};
use crate::auth::transport::{AuthTransport, HttpTransport};
use crate::clock::{Clock, SystemClock};
use crate::config::{ConfigError, GateConfig, ModelConfig, ProxySettings, Resolver};
use crate::error::{GateError, GateResult};
use crate::net::{build_client, ClientOptions};
use crate::resilience::retries::{AsyncInvoke, Invoke, RetryPolicy, Retrying};
use crate::session::cache::SessionCache;
use crate::session::identity::ModelIdentity;

/// The only provider model handles are built for.
pub const SUPPORTED_PROVIDER: &str = "openai";

/// An issued bearer credential. Replaced on refresh, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    /// `"Bearer {token}"`.
    pub bearer: String,
    pub issued_at: SystemTime,
}

/// Which client flavour a model uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Chat,
    Completion,
}

impl ModelKind {
    /// `chat` is a chat model, anything else a completion model.
    pub fn from_type(model_type: Option<&str>) -> Self {
        match model_type {
            Some("chat") => ModelKind::Chat,
            _ => ModelKind::Completion,
        }
    }
}

/// Everything needed to talk to one model endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelHandle {
    pub index: String,
    pub identity: ModelIdentity,
    pub credential: Credential,
    pub kind: ModelKind,
    pub provider: Option<String>,
    pub model_name: Option<String>,
    pub engine: Option<String>,
    pub api_base: Option<String>,
    pub api_version: Option<String>,
    /// Model proxy, else the global one.
    pub proxy: Option<ProxySettings>,
}

impl ModelHandle {
    pub fn authorization(&self) -> &str {
        &self.credential.bearer
    }

    /// HTTP client for model traffic, routed through the handle's proxy.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        build_client(&ClientOptions {
            proxy: self.proxy.clone(),
            ..Default::default()
        })
    }
}

/// Collaborators of a [`TokenBroker`].
#[derive(Clone)]
pub struct BrokerDeps {
    pub transport: Arc<dyn AuthTransport>,
    pub certificates: Arc<CertificateManager>,
    pub source: Arc<dyn CredentialSource>,
    pub policy: RetryPolicy,
    pub clock: Arc<dyn Clock>,
}

impl BrokerDeps {
    /// Real network, process environment, system clock, retry policy from config.
    pub fn production(config: &GateConfig) -> Result<Self, ConfigError> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let client = build_client(&ClientOptions::auth(TOKEN_REQUEST_TIMEOUT))?;

        Ok(Self {
            transport: Arc::new(HttpTransport::new(client)),
            certificates: Arc::new(CertificateManager::with_default_client(clock.clone())?),
            source: Arc::new(ProcessEnv),
            policy: RetryPolicy::from_config(&config.retry),
            clock,
        })
    }
}

impl std::fmt::Debug for BrokerDeps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BrokerDeps")
            .field("transport", &self.transport)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Hands out cached, automatically refreshed model credentials.
#[derive(Debug)]
pub struct TokenBroker {
    config: Arc<GateConfig>,
    deps: BrokerDeps,
    cache: SessionCache<Arc<ModelHandle>>,
}

impl TokenBroker {
    pub fn new(config: Arc<GateConfig>, deps: BrokerDeps) -> Self {
        let ttl = Duration::from_secs(config.token_refresh_interval());
        let cache = SessionCache::new(ttl, deps.clock.clone());
        tracing::debug!(ttl_secs = ttl.as_secs(), "Token broker ready");

        Self { config, deps, cache }
    }

    /// Broker wired with [`BrokerDeps::production`].
    pub fn from_config(config: Arc<GateConfig>) -> Result<Self, ConfigError> {
        let deps = BrokerDeps::production(&config)?;
        Ok(Self::new(config, deps))
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn cache(&self) -> &SessionCache<Arc<ModelHandle>> {
        &self.cache
    }

    /// Identity key of the model at `index`.
    pub fn identity(&self, index: &str) -> GateResult<ModelIdentity> {
        let model = self.config.model(index)?;
        Ok(ModelIdentity::from_config(&self.config, model))
    }

    /// `"Bearer {token}"` for the model at `index`, issued or from cache.
    pub async fn bearer_token(&self, index: &str) -> GateResult<String> {
        let handle = self.handle(index).await?;
        Ok(handle.credential.bearer.clone())
    }

    /// Blocking form of [`bearer_token`](Self::bearer_token). Must not be
    /// called from inside a Tokio runtime.
    pub fn bearer_token_blocking(&self, index: &str) -> GateResult<String> {
        let handle = self.handle_blocking(index)?;
        Ok(handle.credential.bearer.clone())
    }

    /// Model handle for `index`. Only the `openai` provider is supported.
    pub async fn model(&self, index: &str) -> GateResult<Arc<ModelHandle>> {
        check_provider(self.config.model(index)?)?;
        self.handle(index).await
    }

    /// Blocking form of [`model`](Self::model).
    pub fn model_blocking(&self, index: &str) -> GateResult<Arc<ModelHandle>> {
        check_provider(self.config.model(index)?)?;
        self.handle_blocking(index)
    }

    /// Forget the cached credential of the model at `index`.
    pub fn invalidate(&self, index: &str) -> GateResult<bool> {
        let identity = self.identity(index)?;
        Ok(self.cache.invalidate(&identity))
    }

    async fn handle(&self, index: &str) -> GateResult<Arc<ModelHandle>> {
        let model = self.config.model(index)?;
        let key = ModelIdentity::from_config(&self.config, model);
        let identity = key.clone();

        self.cache
            .get_or_issue(&key, move || async move {
                let service = self.retrying_service(index)?;
                let bearer = service.ainvoke(model.clone()).await?;
                Ok::<_, GateError>(self.build_handle(index, identity, model, bearer))
            })
            .await
    }

    fn handle_blocking(&self, index: &str) -> GateResult<Arc<ModelHandle>> {
        let model = self.config.model(index)?;
        let key = ModelIdentity::from_config(&self.config, model);
        let identity = key.clone();

        self.cache.get_or_issue_blocking(&key, move || {
            let service = self.retrying_service(index)?;
            let bearer = service.invoke(model.clone())?;
            Ok::<_, GateError>(self.build_handle(index, identity, model, bearer))
        })
    }

    fn retrying_service(&self, index: &str) -> GateResult<Retrying<TokenService>> {
        let credentials = resolve_credentials(&self.config, index, self.deps.source.as_ref())?;
        let service = TokenService::new(
            credentials,
            self.config.clone(),
            self.deps.certificates.clone(),
            self.deps.transport.clone(),
            self.deps.clock.clone(),
        );
        Ok(Retrying::new(service, self.deps.policy.clone()).with_name("get_token"))
    }

    fn build_handle(
        &self,
        index: &str,
        identity: ModelIdentity,
        model: &ModelConfig,
        bearer: String,
    ) -> Arc<ModelHandle> {
        tracing::info!(index = %index, identity = %identity, "Issued new model session");
        let proxy = Resolver::new(&self.config, model).proxy().cloned();

        Arc::new(ModelHandle {
            index: index.to_string(),
            identity,
            credential: Credential {
                bearer,
                issued_at: self.deps.clock.now(),
            },
            kind: ModelKind::from_type(model.model_type.as_deref()),
            provider: model.provider.clone(),
            model_name: model.model_name.clone(),
            engine: model.engine.clone(),
            api_base: model.api_base.clone(),
            api_version: model.api_version.clone(),
            proxy,
        })
    }
}

fn check_provider(model: &ModelConfig) -> Result<(), ConfigError> {
    match model.provider.as_deref() {
        Some(SUPPORTED_PROVIDER) => Ok(()),
        other => Err(ConfigError::UnsupportedProvider(
            other.unwrap_or("None").to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_kind() {
        assert_eq!(ModelKind::from_type(Some("chat")), ModelKind::Chat);
        assert_eq!(ModelKind::from_type(Some("azure")), ModelKind::Completion);
        assert_eq!(ModelKind::from_type(None), ModelKind::Completion);
    }

    #[test]
    fn test_provider_check() {
        let model = ModelConfig {
            provider: Some("openai".into()),
            ..Default::default()
        };
        assert!(check_provider(&model).is_ok());

        let model = ModelConfig {
            provider: Some("anthropic".into()),
            ..Default::default()
        };
        let err = check_provider(&model).unwrap_err();
        assert_eq!(err.to_string(), r#"Provider "anthropic" is not supported"#);
    }
}
