//! Transport seam for the auth endpoint.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GateResult;

/// Status and decoded JSON body of an auth endpoint answer.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthResponse {
    pub status: u16,
    pub body: Value,
}

/// Posts a JSON document and returns whatever the server answered.
///
/// Implementations map timeouts and connection failures to
/// `GateError::Transient`; any HTTP status is a successful exchange.
#[async_trait]
pub trait AuthTransport: Send + Sync + std::fmt::Debug {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> GateResult<AuthResponse>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AuthTransport for HttpTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &Value,
    ) -> GateResult<AuthResponse> {
        let mut request = self.client.post(url);
        for (name, value) in headers {
            request = request.header(*name, value);
        }

        // headers first: json() keeps an existing Content-Type
        let response = request.json(body).send().await?;
        let status = response.status().as_u16();
        let body = response.json::<Value>().await?;

        Ok(AuthResponse { status, body })
    }
}
