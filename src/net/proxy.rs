//! Proxy settings applied to outbound HTTP clients.

use reqwest::{ClientBuilder, Proxy};

use crate::config::{ConfigError, ProxySettings};

impl ProxySettings {
    /// Proxy URL for plain HTTP traffic.
    pub fn http_url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }

    /// Proxy URL for HTTPS traffic.
    pub fn https_url(&self) -> String {
        format!("https://{}:{}", self.host, self.port)
    }
}

/// Route the builder's traffic through `proxy`, or through nothing at all.
pub fn apply_proxy(
    builder: ClientBuilder,
    proxy: Option<&ProxySettings>,
) -> Result<ClientBuilder, ConfigError> {
    let Some(proxy) = proxy else {
        return Ok(builder.no_proxy());
    };

    let http = Proxy::http(proxy.http_url()).map_err(|e| ConfigError::Proxy(e.to_string()))?;
    let https = Proxy::https(proxy.https_url()).map_err(|e| ConfigError::Proxy(e.to_string()))?;
    tracing::debug!(host = %proxy.host, port = proxy.port, "Using outbound proxy");

    Ok(builder.proxy(http).proxy(https))
}
