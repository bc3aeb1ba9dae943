//! Configuration structures for ZStack sessions.
//!
//! This module provides the connection settings a [`Session`](crate::session::Session)
//! is built from: the management-node endpoint, the TLS trust policy, and the
//! default timings of the request envelope and the async poller.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use url::Url;
use validator::Validate;

/// Configuration for a ZStack session.
///
/// Certificate verification is **off** by default. Management nodes are commonly
/// deployed with self-signed certificates, so the SDK trusts any server
/// certificate unless [`with_tls_verify`](Self::with_tls_verify) or
/// [`with_ca_cert`](Self::with_ca_cert) says otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct ZStackConfig {
    /// Management node base URL (e.g. `https://mn.example.com:8080`)
    #[validate(url)]
    pub endpoint: String,

    /// Whether to verify TLS certificates
    #[serde(default = "default_tls_verify")]
    pub tls_verify: bool,

    /// Optional path to a custom CA certificate (PEM)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[validate(range(min = 1, max = 300))]
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Interval between async-job polls in milliseconds
    #[validate(range(min = 10, max = 60_000))]
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Default overall deadline for async jobs in seconds, used by
    /// [`Session::resolve_default`](crate::session::Session::resolve_default)
    #[validate(range(min = 1, max = 86_400))]
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
}

const fn default_tls_verify() -> bool {
    false
}

const fn default_request_timeout_secs() -> u64 {
    30
}

const fn default_poll_interval_ms() -> u64 {
    1_000
}

const fn default_poll_timeout_secs() -> u64 {
    600
}

impl ZStackConfig {
    /// Create a new configuration for the given management endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or validation fails.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, Error> {
        let config = Self {
            endpoint: endpoint.into(),
            ..Self::default()
        };

        config
            .validate()
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {e}")))?;

        Ok(config)
    }

    /// Set whether to verify TLS certificates.
    #[must_use]
    pub const fn with_tls_verify(mut self, verify: bool) -> Self {
        self.tls_verify = verify;
        self
    }

    /// Set a custom CA certificate path. Implies certificate verification.
    #[must_use]
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.tls_ca_cert = Some(path);
        self.tls_verify = true;
        self
    }

    /// Set the per-request timeout in seconds.
    #[must_use]
    pub const fn with_request_timeout(mut self, seconds: u64) -> Self {
        self.request_timeout_secs = seconds;
        self
    }

    /// Set the async poll interval.
    #[must_use]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        self
    }

    /// Set the default async-job deadline in seconds.
    #[must_use]
    pub const fn with_poll_timeout(mut self, seconds: u64) -> Self {
        self.poll_timeout_secs = seconds;
        self
    }

    /// Per-request timeout as a Duration.
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Poll interval as a Duration.
    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Default async-job deadline as a Duration.
    #[must_use]
    pub const fn poll_timeout(&self) -> Duration {
        Duration::from_secs(self.poll_timeout_secs)
    }

    /// Parse and validate the endpoint URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL cannot be parsed or cannot carry a path.
    pub fn parse_endpoint(&self) -> Result<Url, Error> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| Error::ConfigError(format!("Invalid endpoint URL: {e}")))?;
        if url.cannot_be_a_base() {
            return Err(Error::ConfigError(format!(
                "Endpoint `{}` cannot be used as a base URL",
                self.endpoint
            )));
        }
        Ok(url)
    }
}

impl Default for ZStackConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            tls_verify: default_tls_verify(),
            tls_ca_cert: None,
            request_timeout_secs: default_request_timeout_secs(),
            poll_interval_ms: default_poll_interval_ms(),
            poll_timeout_secs: default_poll_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_new() {
        let config = ZStackConfig::new("https://mn.example.com:8080").unwrap();
        assert_eq!(config.endpoint, "https://mn.example.com:8080");
        assert!(!config.tls_verify);
        assert_eq!(config.request_timeout_secs, 30);
        assert_eq!(config.poll_interval(), Duration::from_secs(1));
        assert_eq!(config.poll_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_config_invalid_url() {
        let result = ZStackConfig::new("not-a-url");
        assert!(matches!(result, Err(Error::ConfigError(_))));
    }

    #[test]
    fn test_config_builder() {
        let config = ZStackConfig::new("https://mn.example.com")
            .unwrap()
            .with_tls_verify(true)
            .with_request_timeout(60)
            .with_poll_interval(Duration::from_millis(250))
            .with_poll_timeout(30);

        assert!(config.tls_verify);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.poll_interval_ms, 250);
        assert_eq!(config.poll_timeout_secs, 30);
    }

    #[test]
    fn test_ca_cert_enables_verification() {
        let config = ZStackConfig::default().with_ca_cert(PathBuf::from("/etc/zstack/ca.pem"));
        assert!(config.tls_verify);
        assert!(config.tls_ca_cert.is_some());
    }

    #[test]
    fn test_parse_endpoint() {
        let config = ZStackConfig::new("https://mn.example.com:8080").unwrap();
        let url = config.parse_endpoint().unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("mn.example.com"));
        assert_eq!(url.port(), Some(8080));
    }

    #[test]
    fn test_deserialize_applies_defaults() {
        let config: ZStackConfig =
            serde_json::from_str(r#"{"endpoint": "http://10.0.0.5:8080"}"#).unwrap();
        assert!(!config.tls_verify);
        assert_eq!(config.poll_interval_ms, 1_000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_ranges() {
        let mut config = ZStackConfig::default();
        config.request_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.request_timeout_secs = 30;
        config.poll_interval_ms = 5;
        assert!(config.validate().is_err());

        config.poll_interval_ms = 1_000;
        config.poll_timeout_secs = 0;
        assert!(config.validate().is_err());

        config.poll_timeout_secs = 600;
        assert!(config.validate().is_ok());
    }
}
