//! Request signing for the enterprise auth handshake.
//!
//! The signature is HMAC-SHA256 over `"{consumer_id}-{version}-{timestamp_ms}"`
//! keyed with the base64-decoded consumer secret, encoded as URL-safe base64
//! with its final padding character removed.

use std::time::{SystemTime, UNIX_EPOCH};

use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

use crate::auth::credentials::CredentialError;

type HmacSha256 = Hmac<Sha256>;

/// Auth protocol version sent in `X-Auth-Version` and signed into the message.
pub const SERVICE_VERSION: &str = "2";

pub const HEADER_CONTENT_TYPE: &str = "Content-Type";
pub const HEADER_APP_ID: &str = "X-Auth-AppID";
pub const HEADER_VERSION: &str = "X-Auth-Version";
pub const HEADER_SIGNATURE: &str = "X-Auth-Signature";
pub const HEADER_TIMESTAMP: &str = "X-Auth-Timestamp";
pub const HEADER_CORRELATION_ID: &str = "X-CorrelationID";

/// Everything that varies per token request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload {
    /// Hex UUID without hyphens.
    pub correlation_id: String,
    pub version: &'static str,
    /// Milliseconds since the Unix epoch.
    pub timestamp_ms: u128,
    pub signature: String,
}

impl SignaturePayload {
    /// Build a fresh payload: new correlation id, timestamp taken from `now`.
    pub fn generate(
        consumer_id: &str,
        consumer_secret: &str,
        now: SystemTime,
    ) -> Result<Self, CredentialError> {
        let timestamp_ms = now
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let signature =
            compute_signature(consumer_id, consumer_secret, SERVICE_VERSION, timestamp_ms)?;

        Ok(Self {
            correlation_id: Uuid::new_v4().simple().to_string(),
            version: SERVICE_VERSION,
            timestamp_ms,
            signature,
        })
    }

    /// Request headers in the order the auth service documents them.
    pub fn headers(&self, app_id: &str) -> Vec<(&'static str, String)> {
        vec![
            (HEADER_CONTENT_TYPE, "application/json".to_string()),
            (HEADER_APP_ID, app_id.to_string()),
            (HEADER_VERSION, self.version.to_string()),
            (HEADER_SIGNATURE, self.signature.clone()),
            (HEADER_TIMESTAMP, self.timestamp_ms.to_string()),
            (HEADER_CORRELATION_ID, self.correlation_id.clone()),
        ]
    }
}

/// Sign `"{consumer_id}-{version}-{timestamp_ms}"` with the decoded secret.
pub fn compute_signature(
    consumer_id: &str,
    consumer_secret: &str,
    version: &str,
    timestamp_ms: u128,
) -> Result<String, CredentialError> {
    let key = STANDARD
        .decode(consumer_secret.trim())
        .map_err(|e| CredentialError::InvalidSecret(e.to_string()))?;

    let mut mac = HmacSha256::new_from_slice(&key)
        .map_err(|e| CredentialError::InvalidSecret(e.to_string()))?;
    mac.update(format!("{consumer_id}-{version}-{timestamp_ms}").as_bytes());
    let digest = mac.finalize().into_bytes();

    // 32 bytes always encode to 44 chars ending in exactly one '='
    let mut encoded = URL_SAFE.encode(digest);
    encoded.pop();
    Ok(encoded)
}
