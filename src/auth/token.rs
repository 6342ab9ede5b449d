//! Bearer token issuance.
//!
//! # Flow
//! ```text
//! NeedCert ──(file missing)──▶ CertificateManager::ensure_certificate
//!    │                                   │
//!    └──────(file present)───────────────┤
//!                                        ▼
//!                                     Signed (SignaturePayload)
//!                                        ▼
//!                                     Requested (POST eas.url)
//!                              200 ─────┴───── other
//!                               ▼               ▼
//!                      "Bearer {token}"   AuthService(description)
//! ```

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::auth::certificate::CertificateManager;
use crate::auth::credentials::ConsumerCredentials;
use crate::auth::signature::SignaturePayload;
use crate::auth::transport::{AuthResponse, AuthTransport, HttpTransport};
use crate::clock::{Clock, SystemClock};
use crate::config::resolve::{require, Resolver};
use crate::config::{GateConfig, ModelConfig};
use crate::error::{GateError, GateResult};
use crate::net::{build_client, ClientOptions};
use crate::observability::metrics;
use crate::resilience::retries::{AsyncInvoke, Invoke};
use crate::resilience::timeouts::with_deadline;

/// Timeout applied to every auth endpoint request.
pub const TOKEN_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Issues bearer tokens for one consumer identity.
#[derive(Debug, Clone)]
pub struct TokenService {
    credentials: ConsumerCredentials,
    config: Arc<GateConfig>,
    certificates: Arc<CertificateManager>,
    transport: Arc<dyn AuthTransport>,
    clock: Arc<dyn Clock>,
}

impl TokenService {
    pub fn new(
        credentials: ConsumerCredentials,
        config: Arc<GateConfig>,
        certificates: Arc<CertificateManager>,
        transport: Arc<dyn AuthTransport>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            credentials,
            config,
            certificates,
            transport,
            clock,
        }
    }

    /// Service wired to the real network and system clock.
    pub fn from_config(
        credentials: ConsumerCredentials,
        config: Arc<GateConfig>,
    ) -> GateResult<Self> {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let client = build_client(&ClientOptions::auth(TOKEN_REQUEST_TIMEOUT))?;
        let certificates = Arc::new(CertificateManager::with_default_client(clock.clone())?);
        let transport = Arc::new(HttpTransport::new(client));

        Ok(Self::new(credentials, config, certificates, transport, clock))
    }

    pub fn credentials(&self) -> &ConsumerCredentials {
        &self.credentials
    }

    /// Issue a bearer token for `model`.
    pub async fn get_token(&self, model: &ModelConfig) -> GateResult<String> {
        let resolver = Resolver::new(&self.config, model);

        let cert_name = require(resolver.cert_name(), "cert.cert_name")?;
        if !Path::new(cert_name).exists() {
            self.certificates.ensure_certificate(&self.config, model).await?;
        }

        let payload = SignaturePayload::generate(
            &self.credentials.consumer_id,
            &self.credentials.consumer_secret,
            self.clock.now(),
        )?;

        let url = require(resolver.eas_url(), "eas.url")?;
        let scope = require(resolver.scope(), "eas.scope")?;
        let originator_source = require(resolver.originator_source(), "eas.originator_source")?;
        let body = json!({
            "scope": scope,
            "additional_claims": { "originator_source": originator_source },
        });
        let headers = payload.headers(&self.credentials.consumer_id);

        tracing::debug!(
            correlation_id = %payload.correlation_id,
            url = %url,
            "Requesting bearer token"
        );

        let exchange = self.transport.post_json(url, &headers, &body);
        let response = match with_deadline(TOKEN_REQUEST_TIMEOUT, "token request", exchange).await {
            Ok(response) => response,
            Err(e) => {
                metrics::record_token_issued("error");
                return Err(e);
            }
        };

        let result = bearer_from_response(response);
        match &result {
            Ok(_) => {
                metrics::record_token_issued("granted");
                tracing::info!(correlation_id = %payload.correlation_id, "Bearer token issued");
            }
            Err(e) => {
                metrics::record_token_issued("denied");
                tracing::warn!(
                    correlation_id = %payload.correlation_id,
                    error = %e,
                    "Auth service denied token request"
                );
            }
        }
        result
    }

    /// Blocking form of [`get_token`](Self::get_token).
    ///
    /// Runs the request on a private current-thread runtime, so it must not
    /// be called from inside another Tokio runtime.
    pub fn get_token_blocking(&self, model: &ModelConfig) -> GateResult<String> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(runtime_error)?;
        runtime.block_on(self.get_token(model))
    }
}

/// Runtime construction failed for lack of OS resources.
fn runtime_error(e: std::io::Error) -> GateError {
    GateError::Transient(format!("failed to start runtime: {e}"))
}

/// Turn an auth endpoint answer into a bearer string or an auth error.
pub fn bearer_from_response(response: AuthResponse) -> GateResult<String> {
    if response.status == 200 {
        return match response.body.get("authorization_token").and_then(Value::as_str) {
            Some(token) => Ok(format!("Bearer {token}")),
            None => Err(GateError::AuthService(
                "Malformed auth response: missing authorization_token".to_string(),
            )),
        };
    }

    let description = response
        .body
        .get("description")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Auth service returned status {}", response.status));
    Err(GateError::AuthService(description))
}

#[async_trait]
impl AsyncInvoke for TokenService {
    type Input = ModelConfig;
    type Output = String;
    type Error = GateError;

    async fn ainvoke(&self, model: ModelConfig) -> GateResult<String> {
        self.get_token(&model).await
    }
}

impl Invoke for TokenService {
    type Input = ModelConfig;
    type Output = String;
    type Error = GateError;

    fn invoke(&self, model: ModelConfig) -> GateResult<String> {
        self.get_token_blocking(&model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Classify, ErrorKind};

    #[test]
    fn test_runtime_failure_is_transient() {
        let err = runtime_error(std::io::Error::other("too many threads"));
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.to_string().contains("failed to start runtime: too many threads"));
    }

    #[test]
    fn test_granted() {
        let response = AuthResponse {
            status: 200,
            body: json!({ "authorization_token": "abc" }),
        };
        assert_eq!(bearer_from_response(response).unwrap(), "Bearer abc");
    }

    #[test]
    fn test_denied_uses_description_verbatim() {
        let response = AuthResponse {
            status: 401,
            body: json!({ "description": "bad signature" }),
        };
        let err = bearer_from_response(response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthService);
        assert_eq!(err.to_string(), "bad signature");
    }

    #[test]
    fn test_denied_without_description() {
        let response = AuthResponse {
            status: 503,
            body: json!({}),
        };
        let err = bearer_from_response(response).unwrap_err();
        assert_eq!(err.to_string(), "Auth service returned status 503");
    }

    #[test]
    fn test_granted_without_token_is_malformed() {
        let response = AuthResponse {
            status: 200,
            body: json!({ "token": "abc" }),
        };
        let err = bearer_from_response(response).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::AuthService);
    }
}
