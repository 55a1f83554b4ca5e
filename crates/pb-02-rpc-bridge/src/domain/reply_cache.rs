//! Replies computed but not yet published.
//!
//! When a reply cannot be published the inbound message is requeued. The
//! reply is kept here under a [`ReplyKey`] so the redelivered message is
//! answered with the same reply instead of a second upstream call.

use dashmap::DashMap;
use shared_types::{CorrelationId, ReplyBody};
use std::fmt;
use std::time::{Duration, Instant};
use tracing::debug;

/// Identity of an inbound message across redeliveries: its correlation id,
/// or the broker message id when the producer sent none, scoped to the
/// routing key it arrived under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReplyKey {
    message: String,
    routing_key: String,
}

impl ReplyKey {
    pub fn new(message: impl Into<String>, routing_key: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            routing_key: routing_key.into(),
        }
    }

    /// `None` when the message carries neither id.
    pub fn for_message(
        correlation_id: Option<&CorrelationId>,
        message_id: Option<&str>,
        routing_key: &str,
    ) -> Option<Self> {
        correlation_id
            .map(CorrelationId::as_str)
            .or(message_id)
            .map(|id| Self::new(id, routing_key))
    }
}

impl fmt::Display for ReplyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.message, self.routing_key)
    }
}

struct CachedReply {
    reply: ReplyBody,
    cached_at: Instant,
}

/// Bounded, TTL-expiring map from message identity to reply
pub struct ReplyCache {
    entries: DashMap<ReplyKey, CachedReply>,
    ttl: Duration,
    capacity: usize,
}

impl ReplyCache {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    /// Keep `reply` for redelivery. At capacity, expired entries are dropped
    /// first, then the oldest entry.
    pub fn insert(&self, key: ReplyKey, reply: ReplyBody) {
        if !self.entries.contains_key(&key) && self.entries.len() >= self.capacity {
            self.remove_expired();
            if self.entries.len() >= self.capacity {
                self.evict_oldest();
            }
        }
        self.entries.insert(
            key,
            CachedReply {
                reply,
                cached_at: Instant::now(),
            },
        );
    }

    /// Cached reply for `key`, if present and not expired.
    pub fn get(&self, key: &ReplyKey) -> Option<ReplyBody> {
        let entry = self.entries.get(key)?;
        if entry.cached_at.elapsed() > self.ttl {
            drop(entry);
            self.entries.remove(key);
            return None;
        }
        Some(entry.reply.clone())
    }

    /// Forget the reply once it has been published.
    pub fn remove(&self, key: &ReplyKey) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn remove_expired(&self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.cached_at.elapsed() <= ttl);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!(removed, "Expired cached replies");
        }
        removed
    }

    fn evict_oldest(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|entry| entry.cached_at)
            .map(|entry| entry.key().clone());
        if let Some(key) = oldest {
            debug!(key = %key, "Evicting oldest cached reply");
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
