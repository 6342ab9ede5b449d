//! Metrics collection and exposition.
//!
//! # Metrics
//! - `chaingate_tokens_issued_total` (counter): token requests by outcome
//! - `chaingate_cache_lookups_total` (counter): session cache lookups by result
//!   (hit, miss, expired)
//! - `chaingate_retry_attempts_total` (counter): retried failures by function
//! - `chaingate_retry_exhausted_total` (counter): calls that ran out of attempts
//! - `chaingate_certificate_downloads_total` (counter): certificate downloads by outcome
//!
//! Recording is a no-op until a recorder is installed with [`init_metrics`].

use std::net::SocketAddr;

use metrics::counter;
use metrics_exporter_prometheus::PrometheusBuilder;

pub const TOKENS_ISSUED: &str = "chaingate_tokens_issued_total";
pub const CACHE_LOOKUPS: &str = "chaingate_cache_lookups_total";
pub const RETRY_ATTEMPTS: &str = "chaingate_retry_attempts_total";
pub const RETRY_EXHAUSTED: &str = "chaingate_retry_exhausted_total";
pub const CERTIFICATE_DOWNLOADS: &str = "chaingate_certificate_downloads_total";

/// Start the Prometheus scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => {
            tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter")
        }
    }
}

pub fn record_token_issued(outcome: &'static str) {
    counter!(TOKENS_ISSUED, "outcome" => outcome).increment(1);
}

pub fn record_cache_lookup(result: &'static str) {
    counter!(CACHE_LOOKUPS, "result" => result).increment(1);
}

pub fn record_retry_attempt(function: &str) {
    counter!(RETRY_ATTEMPTS, "function" => function.to_string()).increment(1);
}

pub fn record_retry_exhausted(function: &str) {
    counter!(RETRY_EXHAUSTED, "function" => function.to_string()).increment(1);
}

pub fn record_certificate_download(outcome: &'static str) {
    counter!(CERTIFICATE_DOWNLOADS, "outcome" => outcome).increment(1);
}
