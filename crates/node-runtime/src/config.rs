//! # Runtime Configuration
//!
//! One TOML document with a section per component, then `PB_*` environment
//! overrides on top.
//!
//! ```toml
//! [upstream]
//! base_url = "https://sandbox.api.example.dev"
//! read_timeout = "30s"
//!
//! [upstream.retry]
//! max_attempts = 3
//! delay = "1s"
//!
//! [bridge]
//! exchange = "payment-bridge-exchange"
//!
//! [http]
//! bind = "0.0.0.0:8080"
//! dispatch_mode = "direct"
//!
//! [logging]
//! format = "json"
//! ```

use std::path::Path;
use std::time::Duration;

use pb_01_upstream_client::{ConfigError as UpstreamConfigError, EnvCredentialProvider, UpstreamConfig};
use pb_02_rpc_bridge::{BridgeConfig, DispatchMode};
use pb_03_api_gateway::HttpConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming the configuration file.
pub const CONFIG_PATH_VAR: &str = "PB_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error(transparent)]
    Upstream(#[from] UpstreamConfigError),

    #[error("{0}")]
    Invalid(String),
}

/// Complete runtime configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub upstream: UpstreamConfig,
    pub bridge: BridgeConfig,
    pub http: HttpConfig,
    pub logging: LoggingConfig,
    pub credentials: CredentialsConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Plain,
            filter: "info".to_string(),
        }
    }
}

/// Where API credentials come from. Static values win when both are set;
/// otherwise they are read from the named environment variables on every call.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub api_key_env: String,
    pub api_secret_env: String,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_secret: None,
            api_key_env: EnvCredentialProvider::DEFAULT_KEY_VAR.to_string(),
            api_secret_env: EnvCredentialProvider::DEFAULT_SECRET_VAR.to_string(),
        }
    }
}

impl std::fmt::Debug for CredentialsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_secret", &self.api_secret.as_ref().map(|_| "<redacted>"))
            .field("api_key_env", &self.api_key_env)
            .field("api_secret_env", &self.api_secret_env)
            .finish()
    }
}

impl CredentialsConfig {
    /// Static key and secret, when both are configured.
    pub fn static_pair(&self) -> Option<(&str, &str)> {
        match (&self.api_key, &self.api_secret) {
            (Some(key), Some(secret)) => Some((key.as_str(), secret.as_str())),
            _ => None,
        }
    }
}

impl RuntimeConfig {
    /// Parse a TOML document.
    pub fn from_toml(path: &str, text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_string(),
            source,
        })
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_toml(&display, &text)
    }

    /// File named by `PB_CONFIG` (defaults when unset), then environment
    /// overrides, then validation.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match std::env::var(CONFIG_PATH_VAR) {
            Ok(path) => Self::from_file(Path::new(&path))?,
            Err(_) => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `PB_*` overrides read through `lookup`.
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(url) = lookup("PB_UPSTREAM_BASE_URL") {
            self.upstream.base_url = url;
        }
        if let Some(value) = lookup("PB_UPSTREAM_MAX_ATTEMPTS") {
            self.upstream.retry.max_attempts = parse_env("PB_UPSTREAM_MAX_ATTEMPTS", &value)?;
        }
        if let Some(value) = lookup("PB_UPSTREAM_RETRY_DELAY_MS") {
            let ms: u64 = parse_env("PB_UPSTREAM_RETRY_DELAY_MS", &value)?;
            self.upstream.retry.delay = Duration::from_millis(ms);
        }
        if let Some(value) = lookup("PB_UPSTREAM_MAX_CONNECTIONS") {
            self.upstream.max_connections = parse_env("PB_UPSTREAM_MAX_CONNECTIONS", &value)?;
        }
        if let Some(exchange) = lookup("PB_BRIDGE_EXCHANGE") {
            self.bridge.exchange = exchange;
        }
        if let Some(prefix) = lookup("PB_BRIDGE_QUEUE_PREFIX") {
            self.bridge.request_queue_prefix = prefix;
        }
        if let Some(value) = lookup("PB_HTTP_BIND") {
            self.http.bind = parse_env("PB_HTTP_BIND", &value)?;
        }
        if let Some(value) = lookup("PB_DISPATCH_MODE") {
            self.http.dispatch_mode = match value.to_ascii_lowercase().as_str() {
                "direct" => DispatchMode::Direct,
                "bus" => DispatchMode::Bus,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "PB_DISPATCH_MODE".into(),
                        value,
                    })
                }
            };
        }
        if let Some(value) = lookup("PB_LOG_FORMAT") {
            self.logging.format = match value.to_ascii_lowercase().as_str() {
                "plain" => LogFormat::Plain,
                "json" => LogFormat::Json,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "PB_LOG_FORMAT".into(),
                        value,
                    })
                }
            };
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.upstream.validate()?;
        self.bridge.validate().map_err(ConfigError::Invalid)?;
        self.http.validate().map_err(ConfigError::Invalid)?;
        if self.credentials.static_pair().is_none()
            && (self.credentials.api_key_env.is_empty() || self.credentials.api_secret_env.is_empty())
        {
            return Err(ConfigError::Invalid(
                "credentials need a static key and secret or both environment variable names"
                    .into(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(var: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidEnv {
        var: var.to_string(),
        value: value.to_string(),
    })
}
