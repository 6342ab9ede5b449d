//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use serde_json::{json, Value};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use chaingate::auth::{AuthResponse, AuthTransport, CertificateManager, CredentialSource};
use chaingate::clock::{Clock, ManualClock};
use chaingate::config::{CertConfig, EasConfig, GateConfig, ModelConfig};
use chaingate::error::{GateError, GateResult};
use chaingate::session::BrokerDeps;
use chaingate::RetryPolicy;

pub const CONSUMER_ID: &str = "consumer-123";
/// base64 of "secret-key-for-tests"
pub const CONSUMER_SECRET: &str = "c2VjcmV0LWtleS1mb3ItdGVzdHM=";

/// Self-signed PEM certificate expiring at `not_after`.
pub fn mint_certificate(not_after: SystemTime) -> String {
    let mut params = rcgen::CertificateParams::new(vec!["auth.example.com".to_string()]).unwrap();
    params.not_before = (not_after - Duration::from_secs(365 * 24 * 3600)).into();
    params.not_after = not_after.into();
    let key = rcgen::KeyPair::generate().unwrap();
    params.self_signed(&key).unwrap().pem()
}

/// PEM certificate valid for another year.
pub fn valid_certificate() -> String {
    mint_certificate(SystemTime::now() + Duration::from_secs(365 * 24 * 3600))
}

/// Write `pem` to `dir/name`, returning the path and its size.
pub fn write_certificate(dir: &Path, name: &str, pem: &str) -> (PathBuf, u64) {
    let path = dir.join(name);
    std::fs::write(&path, pem).unwrap();
    let size = std::fs::metadata(&path).unwrap().len();
    (path, size)
}

/// Auth endpoint answering every POST to `/token` with `status` and `body`.
pub async fn start_auth_server(status: u16, body: Value) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(&server)
        .await;
    server
}

/// Certificate server answering `GET /ca.pem` with `pem`.
pub async fn start_cert_server(pem: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/ca.pem"))
        .respond_with(ResponseTemplate::new(200).set_body_string(pem.to_string()))
        .mount(&server)
        .await;
    server
}

/// Config with one openai chat model at index "1".
pub fn test_config(
    auth_url: &str,
    cert_path: &str,
    cert_name: &Path,
    cert_size: u64,
) -> GateConfig {
    let mut models = BTreeMap::new();
    models.insert(
        "1".to_string(),
        ModelConfig {
            provider: Some("openai".into()),
            model_type: Some("chat".into()),
            engine: Some("engine".into()),
            model_name: Some("test_model".into()),
            api_base: Some("https://llm.example.com".into()),
            api_version: Some("api_version".into()),
            ..Default::default()
        },
    );

    GateConfig {
        eas: EasConfig {
            id_key: Some("CONSUMER_ID".into()),
            secret_key: Some("CONSUMER_SECRET".into()),
            url: Some(auth_url.to_string()),
            scope: Some(vec!["/llm/**::post".into()]),
            originator_source: Some("test-suite".into()),
            token_refresh_interval: Some(100),
        },
        cert: CertConfig {
            cert_path: Some(cert_path.to_string()),
            cert_name: Some(cert_name.display().to_string()),
            cert_size: Some(cert_size),
        },
        models: Some(models),
        ..Default::default()
    }
}

/// Variable source holding the test credentials.
pub fn credential_env() -> HashMap<String, String> {
    HashMap::from([
        ("CONSUMER_ID".to_string(), CONSUMER_ID.to_string()),
        ("CONSUMER_SECRET".to_string(), CONSUMER_SECRET.to_string()),
    ])
}

/// Scripted outcome of one auth exchange.
#[derive(Debug, Clone)]
pub enum Scripted {
    Granted(&'static str),
    Denied(u16, &'static str),
    Transient(&'static str),
}

/// In-memory transport replaying a script and counting calls. The last
/// entry repeats once the script runs out.
#[derive(Debug)]
pub struct ScriptedTransport {
    script: Mutex<Vec<Scripted>>,
    calls: AtomicUsize,
    delay: Duration,
    pub requests: Mutex<Vec<(String, Vec<(&'static str, String)>, Value)>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Self::with_delay(script, Duration::ZERO)
    }

    pub fn with_delay(script: Vec<Scripted>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script),
            calls: AtomicUsize::new(0),
            delay,
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AuthTransport for ScriptedTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> GateResult<AuthResponse> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap()
            .push((url.to_string(), headers.to_vec(), body.clone()));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let step = {
            let script = self.script.lock().unwrap();
            script[n.min(script.len() - 1)].clone()
        };
        match step {
            Scripted::Granted(token) => Ok(AuthResponse {
                status: 200,
                body: json!({ "authorization_token": token }),
            }),
            Scripted::Denied(status, description) => Ok(AuthResponse {
                status,
                body: json!({ "description": description }),
            }),
            Scripted::Transient(reason) => Err(GateError::Transient(reason.to_string())),
        }
    }
}

/// Broker collaborators around `transport`, with a zero-delay retry policy.
pub fn broker_deps(
    transport: Arc<ScriptedTransport>,
    clock: ManualClock,
    max_retry: u32,
) -> BrokerDeps {
    let clock: Arc<dyn Clock> = Arc::new(clock);
    BrokerDeps {
        transport,
        certificates: Arc::new(CertificateManager::new(reqwest::Client::new(), clock.clone())),
        source: Arc::new(credential_env()) as Arc<dyn CredentialSource>,
        policy: RetryPolicy::new(max_retry, Duration::ZERO).with_sleeper(|_| {}),
        clock,
    }
}
