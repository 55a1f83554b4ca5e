//! Upstream client configuration with validation.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use shared_types::Operation;
use url::Url;

use super::circuit_breaker::CircuitBreakerConfig;
use super::retry::RetryPolicy;

/// Upstream client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the upstream API; operation paths are appended to it
    pub base_url: String,
    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,
    /// Applies to the whole response, body included
    #[serde(with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Maximum concurrent in-flight upstream requests
    pub max_connections: usize,
    /// Callers allowed to wait for a free connection before failing fast
    pub max_queued_requests: usize,
    /// Default retry policy
    pub retry: RetryPolicy,
    /// Per-operation overrides, keyed by operation name (e.g. `get-status`)
    pub operation_retry: BTreeMap<String, RetryPolicy>,
    pub circuit_breaker: CircuitBreakerConfig,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8090".to_string(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(30),
            max_connections: 20,
            max_queued_requests: 100,
            retry: RetryPolicy::default(),
            operation_retry: BTreeMap::new(),
            circuit_breaker: CircuitBreakerConfig::default(),
        }
    }
}

impl UpstreamConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Retry policy in force for `operation`.
    pub fn retry_policy_for(&self, operation: Operation) -> &RetryPolicy {
        self.operation_retry
            .get(operation.as_str())
            .unwrap_or(&self.retry)
    }

    /// Parsed base URL. Fails on anything but an absolute http(s) URL.
    pub fn parsed_base_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.base_url)
            .map_err(|e| ConfigError::InvalidBaseUrl(format!("{}: {}", self.base_url, e)))?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::InvalidBaseUrl(format!(
                "unsupported scheme '{}'",
                other
            ))),
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.parsed_base_url()?;

        if self.connect_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout(
                "connect_timeout cannot be 0".into(),
            ));
        }
        if self.read_timeout.is_zero() {
            return Err(ConfigError::InvalidTimeout("read_timeout cannot be 0".into()));
        }

        if self.max_connections == 0 {
            return Err(ConfigError::InvalidLimit(
                "max_connections cannot be 0".into(),
            ));
        }

        self.retry.validate().map_err(ConfigError::InvalidRetry)?;
        for (name, policy) in &self.operation_retry {
            name.parse::<Operation>()
                .map_err(|e| ConfigError::UnknownOperation(e.0))?;
            policy
                .validate()
                .map_err(|e| ConfigError::InvalidRetry(format!("{}: {}", name, e)))?;
        }

        if self.circuit_breaker.enabled && self.circuit_breaker.failure_threshold == 0 {
            return Err(ConfigError::InvalidLimit(
                "circuit_breaker.failure_threshold cannot be 0".into(),
            ));
        }

        Ok(())
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid base url: {0}")]
    InvalidBaseUrl(String),
    #[error("invalid timeout: {0}")]
    InvalidTimeout(String),
    #[error("invalid limit: {0}")]
    InvalidLimit(String),
    #[error("invalid retry policy: {0}")]
    InvalidRetry(String),
    #[error("retry override for unknown operation '{0}'")]
    UnknownOperation(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = UpstreamConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.read_timeout, Duration::from_secs(30));
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_rejects_bad_base_url() {
        let config = UpstreamConfig::default().with_base_url("ftp://example.com");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBaseUrl(_))));

        let config = UpstreamConfig::default().with_base_url("not a url");
        assert!(matches!(config.validate(), Err(ConfigError::InvalidBaseUrl(_))));
    }

    #[test]
    fn test_operation_override() {
        let mut config = UpstreamConfig::default();
        config
            .operation_retry
            .insert("get-status".into(), RetryPolicy::fixed(5, Duration::from_millis(10)));

        assert!(config.validate().is_ok());
        assert_eq!(config.retry_policy_for(Operation::GetStatus).max_attempts, 5);
        assert_eq!(config.retry_policy_for(Operation::EnrollData).max_attempts, 3);
    }

    #[test]
    fn test_rejects_unknown_override() {
        let mut config = UpstreamConfig::default();
        config.operation_retry.insert("teleport".into(), RetryPolicy::none());
        assert_eq!(
            config.validate(),
            Err(ConfigError::UnknownOperation("teleport".into()))
        );
    }

    #[test]
    fn test_rejects_zero_attempts() {
        let config = UpstreamConfig::default().with_retry(RetryPolicy::fixed(0, Duration::ZERO));
        assert!(matches!(config.validate(), Err(ConfigError::InvalidRetry(_))));
    }

    #[test]
    fn test_deserialize_partial() {
        let config: UpstreamConfig = serde_json::from_value(serde_json::json!({
            "base_url": "https://api.example.com/base",
            "read_timeout": "5s",
            "retry": { "max_attempts": 2, "delay": "250ms" }
        }))
        .unwrap();

        assert_eq!(config.base_url, "https://api.example.com/base");
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.delay, Duration::from_millis(250));
        assert_eq!(config.retry.backoff_multiplier, 1.0);
    }
}
