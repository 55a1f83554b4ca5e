//! Reply waiters for bus callers.
//!
//! ```text
//! BusClient::call ──register(id)──→ store ──→ oneshot::Receiver
//!        │ publish(id, replyTo = private queue)
//!        ↓
//! reply listener ──complete(id, reply)──→ store ──→ waiter wakes
//!        or
//! reply timeout ──expire(id)──→ waiter dropped, late reply counted as orphaned
//! ```

use dashmap::DashMap;
use serde::Serialize;
use shared_types::{CorrelationId, Operation, ReplyBody};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// What a waiter receives.
#[derive(Debug)]
pub struct PendingReply {
    pub correlation_id: CorrelationId,
    pub reply: ReplyBody,
    /// Publish-to-reply time
    pub elapsed: Duration,
}

struct Waiter {
    tx: oneshot::Sender<PendingReply>,
    operation: Operation,
    registered_at: Instant,
    deadline: Instant,
}

#[derive(Debug, Default)]
struct PendingStats {
    registered: AtomicU64,
    delivered: AtomicU64,
    expired: AtomicU64,
    /// Waiter gone before its reply arrived
    abandoned: AtomicU64,
    /// Reply with no waiter
    orphaned: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingStatsSnapshot {
    pub registered: u64,
    pub delivered: u64,
    pub expired: u64,
    pub abandoned: u64,
    pub orphaned: u64,
    pub in_flight: usize,
}

pub struct PendingRequestStore {
    waiters: DashMap<CorrelationId, Waiter>,
    reply_timeout: Duration,
    stats: PendingStats,
}

impl PendingRequestStore {
    pub fn new(reply_timeout: Duration) -> Self {
        Self {
            waiters: DashMap::new(),
            reply_timeout,
            stats: PendingStats::default(),
        }
    }

    /// Wait for the reply to `correlation_id`. A second registration for an
    /// id still in flight replaces the first, whose receiver then closes.
    pub fn register(
        &self,
        correlation_id: CorrelationId,
        operation: Operation,
        timeout: Option<Duration>,
    ) -> oneshot::Receiver<PendingReply> {
        let (tx, rx) = oneshot::channel();
        let now = Instant::now();
        let waiter = Waiter {
            tx,
            operation,
            registered_at: now,
            deadline: now + timeout.unwrap_or(self.reply_timeout),
        };

        if let Some(previous) = self.waiters.insert(correlation_id.clone(), waiter) {
            warn!(
                correlation_id = %correlation_id,
                previous_operation = %previous.operation,
                "Duplicate correlation id, earlier waiter replaced"
            );
            bump(&self.stats.abandoned);
        }
        bump(&self.stats.registered);
        debug!(correlation_id = %correlation_id, operation = %operation, "Awaiting reply");
        rx
    }

    /// Wake the waiter for `correlation_id`. False when nobody was waiting
    /// or the waiter already went away.
    pub fn complete(&self, correlation_id: &CorrelationId, reply: ReplyBody) -> bool {
        let Some((correlation_id, waiter)) = self.waiters.remove(correlation_id) else {
            bump(&self.stats.orphaned);
            warn!(correlation_id = %correlation_id, "Reply arrived with no waiter");
            return false;
        };

        let elapsed = waiter.registered_at.elapsed();
        let operation = waiter.operation;
        let delivered = waiter
            .tx
            .send(PendingReply {
                correlation_id: correlation_id.clone(),
                reply,
                elapsed,
            })
            .is_ok();

        if delivered {
            bump(&self.stats.delivered);
            debug!(
                correlation_id = %correlation_id,
                operation = %operation,
                elapsed_ms = elapsed.as_millis() as u64,
                "Reply delivered"
            );
        } else {
            bump(&self.stats.abandoned);
            debug!(correlation_id = %correlation_id, operation = %operation, "Caller gone, reply discarded");
        }
        delivered
    }

    /// Drop waiters past their deadline. Returns how many went.
    pub fn remove_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.waiters.len();
        self.waiters.retain(|id, waiter| {
            let keep = waiter.deadline > now;
            if !keep {
                warn!(correlation_id = %id, operation = %waiter.operation, "Reply waiter expired");
                bump(&self.stats.expired);
            }
            keep
        });
        before.saturating_sub(self.waiters.len())
    }

    /// The caller timed out on its own.
    pub fn expire(&self, correlation_id: &CorrelationId) -> bool {
        self.take(correlation_id, &self.stats.expired)
    }

    /// The request never left, e.g. its publish failed.
    pub fn cancel(&self, correlation_id: &CorrelationId) -> bool {
        self.take(correlation_id, &self.stats.abandoned)
    }

    fn take(&self, correlation_id: &CorrelationId, counter: &AtomicU64) -> bool {
        let removed = self.waiters.remove(correlation_id).is_some();
        if removed {
            bump(counter);
        }
        removed
    }

    pub fn pending_count(&self) -> usize {
        self.waiters.len()
    }

    pub fn is_pending(&self, correlation_id: &CorrelationId) -> bool {
        self.waiters.contains_key(correlation_id)
    }

    pub fn stats(&self) -> PendingStatsSnapshot {
        let load = |c: &AtomicU64| c.load(Ordering::Relaxed);
        PendingStatsSnapshot {
            registered: load(&self.stats.registered),
            delivered: load(&self.stats.delivered),
            expired: load(&self.stats.expired),
            abandoned: load(&self.stats.abandoned),
            orphaned: load(&self.stats.orphaned),
            in_flight: self.waiters.len(),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// Periodic sweep of expired waiters; runs until aborted.
pub async fn expiry_sweeper(store: std::sync::Arc<PendingRequestStore>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    loop {
        ticker.tick().await;
        let removed = store.remove_expired();
        if removed > 0 {
            debug!(removed, "Expired reply waiters swept");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn id(value: &str) -> CorrelationId {
        CorrelationId::parse(value).unwrap()
    }

    fn accepted(id: &CorrelationId) -> ReplyBody {
        ReplyBody::success(Some(id.clone()), json!({ "requestTraceId": "t-1" }))
    }

    #[tokio::test]
    async fn test_reply_wakes_waiter() {
        let store = PendingRequestStore::new(Duration::from_secs(5));
        let corr = id("enroll-1");

        let rx = store.register(corr.clone(), Operation::EnrollData, None);
        assert!(store.is_pending(&corr));

        assert!(store.complete(&corr, accepted(&corr)));
        let delivered = rx.await.unwrap();
        assert_eq!(delivered.correlation_id, corr);
        assert!(delivered.reply.is_success());

        let stats = store.stats();
        assert_eq!((stats.registered, stats.delivered, stats.in_flight), (1, 1, 0));
    }

    #[tokio::test]
    async fn test_late_reply_is_orphaned() {
        let store = PendingRequestStore::new(Duration::from_secs(5));
        let corr = id("late-1");

        let _rx = store.register(corr.clone(), Operation::GetData, None);
        assert!(store.expire(&corr));
        assert!(!store.complete(&corr, accepted(&corr)));

        let stats = store.stats();
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.orphaned, 1);
    }

    #[tokio::test]
    async fn test_dropped_receiver_counts_as_abandoned() {
        let store = PendingRequestStore::new(Duration::from_secs(5));
        let corr = id("gone-1");

        drop(store.register(corr.clone(), Operation::GetStatus, None));
        assert!(!store.complete(&corr, accepted(&corr)));
        assert_eq!(store.stats().abandoned, 1);
    }

    #[tokio::test]
    async fn test_sweep_respects_per_waiter_deadline() {
        let store = PendingRequestStore::new(Duration::from_millis(10));
        let short = id("short");
        let long = id("long");

        let _a = store.register(short.clone(), Operation::DeleteConsumer, None);
        let _b = store.register(long.clone(), Operation::DeleteConsumer, Some(Duration::from_secs(30)));

        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.remove_expired(), 1);
        assert!(!store.is_pending(&short));
        assert!(store.is_pending(&long));
        assert_eq!(store.stats().expired, 1);
    }

    #[tokio::test]
    async fn test_duplicate_registration_closes_first_receiver() {
        let store = PendingRequestStore::new(Duration::from_secs(5));
        let corr = id("dup-1");

        let first = store.register(corr.clone(), Operation::EnrollData, None);
        let second = store.register(corr.clone(), Operation::EnrollData, None);
        assert!(first.await.is_err());

        assert!(store.complete(&corr, accepted(&corr)));
        assert!(second.await.is_ok());
        assert_eq!(store.pending_count(), 0);
    }

    #[test]
    fn test_cancel_only_removes_once() {
        let store = PendingRequestStore::new(Duration::from_secs(5));
        let corr = id("cancel-1");
        let _rx = store.register(corr.clone(), Operation::ManageConsumer, None);
        assert!(store.cancel(&corr));
        assert!(!store.cancel(&corr));
    }
}
