//! HTTP client construction.

use std::time::Duration;

use reqwest::Client;

use crate::config::{ConfigError, ProxySettings};
use crate::net::proxy::apply_proxy;

/// Settings for one outbound client.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    /// Whole-request timeout. `None` leaves reqwest's default (no timeout).
    pub timeout: Option<Duration>,

    /// Skip server certificate verification.
    pub accept_invalid_certs: bool,

    /// Keep no idle connections between requests.
    pub disable_pooling: bool,

    pub proxy: Option<ProxySettings>,
}

impl ClientOptions {
    /// Options for the auth endpoint: short timeout, no verification, no pooling.
    pub fn auth(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
            accept_invalid_certs: true,
            disable_pooling: true,
            proxy: None,
        }
    }
}

/// Build a client from `options`.
pub fn build_client(options: &ClientOptions) -> Result<Client, ConfigError> {
    let mut builder = Client::builder().danger_accept_invalid_certs(options.accept_invalid_certs);
    if let Some(timeout) = options.timeout {
        builder = builder.timeout(timeout);
    }
    if options.disable_pooling {
        builder = builder.pool_max_idle_per_host(0);
    }
    builder = apply_proxy(builder, options.proxy.as_ref())?;

    builder
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}
