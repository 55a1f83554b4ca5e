//! HTTP surface configuration.

use pb_02_rpc_bridge::DispatchMode;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub bind: SocketAddr,
    /// Whether operations run in-process or over the bus
    pub dispatch_mode: DispatchMode,
    /// Applied to the whole request, upstream retries included
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
    pub max_body_bytes: usize,
    /// Reported by `GET /health`
    pub service_name: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            dispatch_mode: DispatchMode::Direct,
            request_timeout: Duration::from_secs(120),
            max_body_bytes: 1024 * 1024,
            service_name: "payment-bridge".to_string(),
        }
    }
}

impl HttpConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.request_timeout.is_zero() {
            return Err("http.request_timeout must be greater than zero".into());
        }
        if self.max_body_bytes == 0 {
            return Err("http.max_body_bytes must be greater than zero".into());
        }
        Ok(())
    }
}
