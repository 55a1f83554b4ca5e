//! Bridge counters, exported as JSON on `GET /metrics`.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// RPC bridge metrics
#[derive(Debug, Default)]
pub struct BridgeMetrics {
    // Inbound
    pub messages_received: AtomicU64,
    pub messages_redelivered: AtomicU64,

    // Upstream
    pub upstream_calls: AtomicU64,
    pub upstream_failures: AtomicU64,

    // Replies
    pub replies_published: AtomicU64,
    pub error_replies: AtomicU64,
    pub reply_publish_failures: AtomicU64,
    pub reply_cache_hits: AtomicU64,

    // Settlement
    pub acks: AtomicU64,
    pub nacks: AtomicU64,

    // Latency (sum and count, average derived)
    pub total_latency_ms: AtomicU64,
    pub latency_samples: AtomicU64,
}

impl BridgeMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_received(&self, redelivered: bool) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
        if redelivered {
            self.messages_redelivered.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_upstream_call(&self, success: bool, latency_ms: u64) {
        self.upstream_calls.fetch_add(1, Ordering::Relaxed);
        if !success {
            self.upstream_failures.fetch_add(1, Ordering::Relaxed);
        }
        self.total_latency_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_reply_published(&self, is_error: bool) {
        self.replies_published.fetch_add(1, Ordering::Relaxed);
        if is_error {
            self.error_replies.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn record_publish_failure(&self) {
        self.reply_publish_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.reply_cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_ack(&self) {
        self.acks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_nack(&self) {
        self.nacks.fetch_add(1, Ordering::Relaxed);
    }

    pub fn average_latency_ms(&self) -> f64 {
        let total = self.total_latency_ms.load(Ordering::Relaxed);
        let count = self.latency_samples.load(Ordering::Relaxed);
        if count == 0 {
            0.0
        } else {
            total as f64 / count as f64
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        MetricsSnapshot {
            messages_received: load(&self.messages_received),
            messages_redelivered: load(&self.messages_redelivered),
            upstream_calls: load(&self.upstream_calls),
            upstream_failures: load(&self.upstream_failures),
            replies_published: load(&self.replies_published),
            error_replies: load(&self.error_replies),
            reply_publish_failures: load(&self.reply_publish_failures),
            reply_cache_hits: load(&self.reply_cache_hits),
            acks: load(&self.acks),
            nacks: load(&self.nacks),
            average_latency_ms: self.average_latency_ms(),
        }
    }
}

/// Point-in-time copy of [`BridgeMetrics`]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub messages_redelivered: u64,
    pub upstream_calls: u64,
    pub upstream_failures: u64,
    pub replies_published: u64,
    pub error_replies: u64,
    pub reply_publish_failures: u64,
    pub reply_cache_hits: u64,
    pub acks: u64,
    pub nacks: u64,
    pub average_latency_ms: f64,
}
