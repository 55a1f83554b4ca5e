//! # In-Memory Broker
//!
//! Single-process implementation of [`MessageBroker`] with queue, exchange
//! binding and acknowledgement semantics of an AMQP broker. Suitable for
//! single-node operation and tests; networked deployments plug in a different
//! implementation behind the same traits.

use crate::envelope::Envelope;
use crate::publisher::{BrokerError, MessageBroker, MessagePublisher};
use crate::subscriber::{Acknowledger, Consumer, Delivery};
use crate::{DEFAULT_CHANNEL_CAPACITY, DEFAULT_EXCHANGE};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
struct QueuedMessage {
    envelope: Envelope,
    exchange: String,
    routing_key: String,
    redelivered: bool,
}

struct QueueState {
    sender: mpsc::Sender<QueuedMessage>,
    receiver: Arc<Mutex<mpsc::Receiver<QueuedMessage>>>,
}

/// Delivered but not yet settled.
struct Unacked {
    queue: String,
    message: QueuedMessage,
}

/// Broker counters.
#[derive(Debug, Default)]
pub struct BrokerStats {
    /// Publish calls accepted
    pub published: AtomicU64,
    /// Messages handed to consumers (including redeliveries)
    pub delivered: AtomicU64,
    pub acked: AtomicU64,
    pub nacked: AtomicU64,
    /// Negative acknowledgements that put the message back on its queue
    pub requeued: AtomicU64,
    /// Messages that matched no queue
    pub dropped: AtomicU64,
}

struct BrokerInner {
    queues: DashMap<String, Arc<QueueState>>,
    /// (exchange, routing key) -> bound queues
    bindings: DashMap<(String, String), Vec<String>>,
    unacked: DashMap<u64, Unacked>,
    next_tag: AtomicU64,
    available: AtomicBool,
    capacity: usize,
    stats: BrokerStats,
}

impl BrokerInner {
    fn queue(&self, name: &str) -> Option<Arc<QueueState>> {
        self.queues.get(name).map(|q| Arc::clone(q.value()))
    }

    fn declare(&self, name: &str) {
        self.queues.entry(name.to_string()).or_insert_with(|| {
            let (sender, receiver) = mpsc::channel(self.capacity);
            debug!(queue = name, "Queue declared");
            Arc::new(QueueState {
                sender,
                receiver: Arc::new(Mutex::new(receiver)),
            })
        });
    }

    async fn enqueue(&self, queue: &str, message: QueuedMessage) -> Result<(), BrokerError> {
        let state = self
            .queue(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;
        state
            .sender
            .send(message)
            .await
            .map_err(|_| BrokerError::ChannelClosed)
    }

    fn route(&self, exchange: &str, routing_key: &str) -> Vec<String> {
        if exchange == DEFAULT_EXCHANGE {
            if self.queues.contains_key(routing_key) {
                vec![routing_key.to_string()]
            } else {
                Vec::new()
            }
        } else {
            self.bindings
                .get(&(exchange.to_string(), routing_key.to_string()))
                .map(|queues| queues.value().clone())
                .unwrap_or_default()
        }
    }

    fn track(self: &Arc<Self>, queue: &str, message: QueuedMessage) -> Delivery {
        let tag = self.next_tag.fetch_add(1, Ordering::Relaxed) + 1;
        self.stats.delivered.fetch_add(1, Ordering::Relaxed);

        let delivery = Delivery::new(
            message.envelope.clone(),
            message.exchange.clone(),
            message.routing_key.clone(),
            queue,
            tag,
            message.redelivered,
            Arc::clone(self) as Arc<dyn Acknowledger>,
        );

        self.unacked.insert(
            tag,
            Unacked {
                queue: queue.to_string(),
                message,
            },
        );
        delivery
    }
}

#[async_trait]
impl Acknowledger for BrokerInner {
    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError> {
        self.unacked
            .remove(&delivery_tag)
            .ok_or(BrokerError::UnknownDelivery(delivery_tag))?;
        self.stats.acked.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError> {
        let (_, unacked) = self
            .unacked
            .remove(&delivery_tag)
            .ok_or(BrokerError::UnknownDelivery(delivery_tag))?;
        self.stats.nacked.fetch_add(1, Ordering::Relaxed);

        if requeue {
            self.stats.requeued.fetch_add(1, Ordering::Relaxed);
            let mut message = unacked.message;
            message.redelivered = true;
            self.enqueue(&unacked.queue, message).await?;
        } else {
            warn!(queue = %unacked.queue, delivery_tag, "Message rejected without requeue");
        }
        Ok(())
    }
}

/// In-memory message broker.
///
/// Cheap to clone; clones share the same queues.
#[derive(Clone)]
pub struct InMemoryBroker {
    inner: Arc<BrokerInner>,
}

impl InMemoryBroker {
    /// Create a new broker with default per-queue capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new broker with the specified per-queue capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: Arc::new(BrokerInner {
                queues: DashMap::new(),
                bindings: DashMap::new(),
                unacked: DashMap::new(),
                next_tag: AtomicU64::new(0),
                available: AtomicBool::new(true),
                capacity: capacity.max(1),
                stats: BrokerStats::default(),
            }),
        }
    }

    /// Simulate losing or regaining the broker connection. While unavailable,
    /// every publish fails.
    pub fn set_available(&self, available: bool) {
        self.inner.available.store(available, Ordering::SeqCst);
    }

    pub fn is_available(&self) -> bool {
        self.inner.available.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> &BrokerStats {
        &self.inner.stats
    }

    /// Deliveries handed out and not yet settled.
    pub fn unacked_count(&self) -> usize {
        self.inner.unacked.len()
    }

    /// Messages waiting in `queue`, `None` if it does not exist.
    pub fn queue_depth(&self, queue: &str) -> Option<usize> {
        self.inner
            .queue(queue)
            .map(|q| self.inner.capacity - q.sender.capacity())
    }

    pub fn queue_exists(&self, queue: &str) -> bool {
        self.inner.queues.contains_key(queue)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MessagePublisher for InMemoryBroker {
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        mut envelope: Envelope,
    ) -> Result<(), BrokerError> {
        if !self.is_available() {
            return Err(BrokerError::Unavailable("connection lost".into()));
        }
        if envelope.message_id.is_none() {
            envelope.message_id = Some(Uuid::new_v4().to_string());
        }
        self.inner.stats.published.fetch_add(1, Ordering::Relaxed);

        let targets = self.inner.route(exchange, routing_key);
        if targets.is_empty() {
            self.inner.stats.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                exchange = exchange,
                routing_key = routing_key,
                "Message dropped (no route)"
            );
            return Ok(());
        }

        for queue in &targets {
            let message = QueuedMessage {
                envelope: envelope.clone(),
                exchange: exchange.to_string(),
                routing_key: routing_key.to_string(),
                redelivered: false,
            };
            self.inner.enqueue(queue, message).await?;
        }

        debug!(
            exchange = exchange,
            routing_key = routing_key,
            queues = targets.len(),
            "Message published"
        );
        Ok(())
    }
}

#[async_trait]
impl MessageBroker for InMemoryBroker {
    async fn declare_queue(&self, name: &str) -> Result<(), BrokerError> {
        self.inner.declare(name);
        Ok(())
    }

    async fn declare_exclusive_queue(&self) -> Result<String, BrokerError> {
        let name = format!("amq.gen-{}", Uuid::new_v4().simple());
        self.inner.declare(&name);
        Ok(name)
    }

    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError> {
        if !self.queue_exists(queue) {
            return Err(BrokerError::QueueNotFound(queue.to_string()));
        }
        let mut bound = self
            .inner
            .bindings
            .entry((exchange.to_string(), routing_key.to_string()))
            .or_default();
        if !bound.iter().any(|q| q == queue) {
            bound.push(queue.to_string());
        }
        debug!(queue, exchange, routing_key, "Queue bound");
        Ok(())
    }

    async fn consume(&self, queue: &str) -> Result<Consumer, BrokerError> {
        let state = self
            .inner
            .queue(queue)
            .ok_or_else(|| BrokerError::QueueNotFound(queue.to_string()))?;

        let seed = (
            Arc::clone(&state.receiver),
            Arc::clone(&self.inner),
            queue.to_string(),
        );
        let stream = futures::stream::unfold(seed, |(receiver, inner, queue)| async move {
            let message = {
                let mut rx = receiver.lock().await;
                rx.recv().await
            }?;
            let delivery = inner.track(&queue, message);
            Some((delivery, (receiver, inner, queue)))
        });

        Ok(Consumer::new(queue, stream))
    }
}
