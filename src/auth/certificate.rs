//! Client certificate retrieval and validation.
//!
//! # Responsibilities
//! - Download the PEM certificate from `cert_path` when `cert_name` is missing locally
//! - Check the file size against `cert_size`
//! - Reject certificates whose not-after date is not strictly in the future
//!
//! Downloads land in a sibling `.partial` file and are renamed onto
//! `cert_name` only once they pass both checks, so a failed or interrupted
//! download never leaves a file at `cert_name`.
//!
//! Concurrent callers for the same file are serialised; the second caller
//! validates the file the first one wrote instead of downloading it again.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use x509_parser::parse_x509_certificate;

use crate::clock::Clock;
use crate::config::resolve::{require, Resolver};
use crate::config::{ConfigError, GateConfig, ModelConfig};
use crate::error::{GateError, GateResult};
use crate::net::{build_client, ClientOptions};
use crate::observability::metrics;
use crate::resilience::timeouts::with_deadline;

/// Upper bound on one certificate download.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for certificate handling.
#[derive(Debug, Error)]
pub enum CertificateError {
    #[error("Failed to Download the certificate from {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("Failed to Download the certificate: {path} is {actual} bytes, expected {expected}")]
    SizeMismatch {
        path: String,
        expected: u64,
        actual: u64,
    },

    #[error("Failed to access certificate {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid certificate {path}: {reason}")]
    Invalid { path: String, reason: String },

    #[error("Certificate expired, please renew (not after {not_after})")]
    Expired { not_after: String },
}

/// Keeps the local client certificate present and valid.
#[derive(Debug)]
pub struct CertificateManager {
    client: reqwest::Client,
    clock: Arc<dyn Clock>,
    locks: DashMap<PathBuf, Arc<Mutex<()>>>,
}

impl CertificateManager {
    pub fn new(client: reqwest::Client, clock: Arc<dyn Clock>) -> Self {
        Self {
            client,
            clock,
            locks: DashMap::new(),
        }
    }

    /// Manager with its own download client (verifying, no proxy).
    pub fn with_default_client(clock: Arc<dyn Clock>) -> Result<Self, ConfigError> {
        let client = build_client(&ClientOptions {
            timeout: Some(DOWNLOAD_TIMEOUT),
            ..Default::default()
        })?;
        Ok(Self::new(client, clock))
    }

    /// Make sure the certificate for `model` exists locally and is usable.
    pub async fn ensure_certificate(
        &self,
        config: &GateConfig,
        model: &ModelConfig,
    ) -> GateResult<()> {
        let resolver = Resolver::new(config, model);
        let url = require(resolver.cert_path(), "cert.cert_path")?;
        let name = require(resolver.cert_name(), "cert.cert_name")?;
        let expected_size = require(resolver.cert_size(), "cert.cert_size")?;
        let path = PathBuf::from(name);

        let lock = self
            .locks
            .entry(path.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if path.exists() {
            return self.validate(&path, &path, expected_size).await;
        }

        let staging = staging_path(&path);
        match self.install(url, &staging, &path, expected_size).await {
            Ok(()) => {
                metrics::record_certificate_download("success");
                Ok(())
            }
            Err(e) => {
                metrics::record_certificate_download("failure");
                if let Err(cleanup) = tokio::fs::remove_file(&staging).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(
                            path = %staging.display(),
                            error = %cleanup,
                            "Failed to remove partial certificate"
                        );
                    }
                }
                Err(e)
            }
        }
    }

    /// Download into `staging`, validate it, then move it onto `path`.
    async fn install(
        &self,
        url: &str,
        staging: &Path,
        path: &Path,
        expected_size: u64,
    ) -> GateResult<()> {
        let download = self.download(url, staging);
        with_deadline(DOWNLOAD_TIMEOUT, "certificate download", download).await?;
        self.validate(staging, path, expected_size).await?;
        tokio::fs::rename(staging, path)
            .await
            .map_err(|source| io_error(path, source))
    }

    async fn download(&self, url: &str, path: &Path) -> GateResult<()> {
        tracing::info!(url = %url, path = %path.display(), "Downloading certificate");

        let fetch_error = |reason: String| CertificateError::Fetch {
            url: url.to_string(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| fetch_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fetch_error(format!("status {}", response.status().as_u16())).into());
        }
        let body = response.bytes().await.map_err(|e| fetch_error(e.to_string()))?;

        tokio::fs::write(path, &body)
            .await
            .map_err(|source| io_error(path, source))?;
        Ok(())
    }

    /// Check the file at `file`; errors name the certificate as `name`.
    async fn validate(&self, file: &Path, name: &Path, expected_size: u64) -> GateResult<()> {
        let actual = tokio::fs::metadata(file)
            .await
            .map_err(|source| io_error(name, source))?
            .len();
        if actual != expected_size {
            return Err(CertificateError::SizeMismatch {
                path: name.display().to_string(),
                expected: expected_size,
                actual,
            }
            .into());
        }

        let pem = tokio::fs::read(file)
            .await
            .map_err(|source| io_error(name, source))?;
        let (not_after, rendered) =
            certificate_not_after(&pem).map_err(|reason| CertificateError::Invalid {
                path: name.display().to_string(),
                reason,
            })?;

        let now = self
            .clock
            .now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_secs() as i64)
            .unwrap_or(0);
        if not_after <= now {
            tracing::warn!(
                path = %name.display(),
                not_after = %rendered,
                "Certificate expired"
            );
            return Err(CertificateError::Expired { not_after: rendered }.into());
        }

        tracing::debug!(path = %name.display(), not_after = %rendered, "Certificate valid");
        Ok(())
    }
}

/// `cert.pem` -> `cert.pem.partial`, in the same directory so the final
/// rename stays on one filesystem.
fn staging_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".partial");
    PathBuf::from(name)
}

fn io_error(path: &Path, source: std::io::Error) -> GateError {
    CertificateError::Io {
        path: path.display().to_string(),
        source,
    }
    .into()
}

/// Not-after of the first certificate in `pem`, as Unix seconds plus a
/// printable form.
pub fn certificate_not_after(pem: &[u8]) -> Result<(i64, String), String> {
    let der = rustls_pemfile::certs(&mut &pem[..])
        .next()
        .ok_or_else(|| "no certificate in PEM data".to_string())?
        .map_err(|e| format!("failed to parse PEM: {e}"))?;

    let (_, cert) = parse_x509_certificate(der.as_ref())
        .map_err(|e| format!("X.509 parsing failed: {e}"))?;
    let not_after = cert.validity().not_after;
    Ok((not_after.timestamp(), not_after.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_after_rejects_garbage() {
        assert!(certificate_not_after(b"not a certificate").is_err());
        assert!(certificate_not_after(b"").is_err());
    }

    #[test]
    fn test_not_after_of_minted_certificate() {
        let mut params =
            rcgen::CertificateParams::new(vec!["auth.example.com".to_string()]).unwrap();
        params.not_after = rcgen::date_time_ymd(2040, 1, 1);
        let key = rcgen::KeyPair::generate().unwrap();
        let cert = params.self_signed(&key).unwrap();

        let (secs, rendered) = certificate_not_after(cert.pem().as_bytes()).unwrap();
        // 2040-01-01T00:00:00Z
        assert_eq!(secs, 2_208_988_800);
        assert!(rendered.contains("2040"));
    }

    #[test]
    fn test_staging_path_is_sibling() {
        let staged = staging_path(Path::new("/tmp/certs/ca.pem"));
        assert_eq!(staged, PathBuf::from("/tmp/certs/ca.pem.partial"));
        assert_eq!(staged.parent(), Some(Path::new("/tmp/certs")));
    }

    #[test]
    fn test_error_messages() {
        let err = CertificateError::SizeMismatch {
            path: "ca.pem".into(),
            expected: 10,
            actual: 3,
        };
        assert!(err.to_string().starts_with("Failed to Download the certificate"));

        let err = CertificateError::Expired {
            not_after: "Jan  1 00:00:00 2020 +00:00".into(),
        };
        assert!(err.to_string().starts_with("Certificate expired, please renew"));
    }
}
