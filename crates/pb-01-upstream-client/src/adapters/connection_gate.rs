//! Bounded admission to the upstream connection pool.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use shared_types::{OperationFailure, OperationResult};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::warn;

/// At most `max_connections` requests in flight; at most `max_queued`
/// callers waiting for a slot. Callers beyond that fail with `PoolExhausted`.
#[derive(Clone)]
pub struct ConnectionGate {
    permits: Arc<Semaphore>,
    waiting: Arc<AtomicUsize>,
    max_connections: usize,
    max_queued: usize,
}

/// Held for the duration of one upstream request.
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

struct WaitingGuard(Arc<AtomicUsize>);

impl Drop for WaitingGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl ConnectionGate {
    pub fn new(max_connections: usize, max_queued: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(max_connections)),
            waiting: Arc::new(AtomicUsize::new(0)),
            max_connections,
            max_queued,
        }
    }

    pub async fn acquire(&self) -> OperationResult<ConnectionPermit> {
        if let Ok(permit) = self.permits.clone().try_acquire_owned() {
            return Ok(ConnectionPermit { _permit: permit });
        }

        let queued = self.waiting.fetch_add(1, Ordering::SeqCst);
        let _guard = WaitingGuard(self.waiting.clone());
        if queued >= self.max_queued {
            warn!(
                max_connections = self.max_connections,
                max_queued = self.max_queued,
                "Upstream connection pool exhausted"
            );
            return Err(OperationFailure::pool_exhausted(format!(
                "all {} connections busy and {} requests already queued",
                self.max_connections, self.max_queued
            )));
        }

        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| OperationFailure::pool_exhausted("connection pool closed"))?;
        Ok(ConnectionPermit { _permit: permit })
    }

    pub fn in_flight(&self) -> usize {
        self.max_connections - self.permits.available_permits()
    }

    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::errors::reasons;
    use std::time::Duration;

    #[tokio::test]
    async fn test_admits_up_to_capacity() {
        let gate = ConnectionGate::new(2, 0);
        let a = gate.acquire().await.unwrap();
        let _b = gate.acquire().await.unwrap();
        assert_eq!(gate.in_flight(), 2);

        let err = gate.acquire().await.err().unwrap();
        assert_eq!(err.reason(), reasons::POOL_EXHAUSTED);

        drop(a);
        assert!(gate.acquire().await.is_ok());
    }

    #[tokio::test]
    async fn test_queued_caller_gets_slot_on_release() {
        let gate = ConnectionGate::new(1, 1);
        let held = gate.acquire().await.unwrap();

        let waiter = {
            let gate = gate.clone();
            tokio::spawn(async move { gate.acquire().await.is_ok() })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(gate.waiting(), 1);

        // Queue is full, next caller fails fast
        assert!(gate.acquire().await.is_err());

        drop(held);
        assert!(waiter.await.unwrap());
        assert_eq!(gate.waiting(), 0);
    }
}
