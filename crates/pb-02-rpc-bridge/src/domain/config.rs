//! Bridge configuration.

use serde::{Deserialize, Serialize};
use shared_types::Operation;
use std::time::Duration;

/// Bus-side configuration of the bridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// Direct exchange the request queues are bound on
    pub exchange: String,
    /// Request queues are named `<prefix>.<routingKey>`
    pub request_queue_prefix: String,
    /// How long an asynchronous caller waits for its reply
    #[serde(with = "humantime_serde")]
    pub reply_timeout: Duration,
    /// How long an unpublished reply is kept for redelivery
    #[serde(with = "humantime_serde")]
    pub reply_cache_ttl: Duration,
    pub reply_cache_capacity: usize,
    /// Pause before a delivery whose reply could not be published is requeued
    #[serde(with = "humantime_serde")]
    pub redelivery_delay: Duration,
    /// Interval of the expiry sweep over pending requests and cached replies
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            exchange: "payment-bridge-exchange".to_string(),
            request_queue_prefix: "payment-bridge-requests".to_string(),
            reply_timeout: Duration::from_secs(30),
            reply_cache_ttl: Duration::from_secs(300),
            reply_cache_capacity: 10_000,
            redelivery_delay: Duration::from_secs(1),
            cleanup_interval: Duration::from_secs(10),
        }
    }
}

impl BridgeConfig {
    /// Queue consumed for `operation`.
    pub fn queue_name(&self, operation: Operation) -> String {
        format!("{}.{}", self.request_queue_prefix, operation.routing_key())
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.exchange.trim().is_empty() {
            return Err("bridge.exchange cannot be empty".into());
        }
        if self.request_queue_prefix.trim().is_empty() {
            return Err("bridge.request_queue_prefix cannot be empty".into());
        }
        if self.reply_timeout.is_zero() {
            return Err("bridge.reply_timeout cannot be 0".into());
        }
        if self.reply_cache_capacity == 0 {
            return Err("bridge.reply_cache_capacity cannot be 0".into());
        }
        if self.cleanup_interval.is_zero() {
            return Err("bridge.cleanup_interval cannot be 0".into());
        }
        Ok(())
    }
}
