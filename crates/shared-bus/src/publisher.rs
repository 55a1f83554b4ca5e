//! # Broker Ports
//!
//! Publishing and topology operations a message broker provides.

use crate::envelope::Envelope;
use crate::subscriber::Consumer;
use async_trait::async_trait;
use thiserror::Error;

/// Broker operation errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BrokerError {
    /// Broker connection is down.
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("queue not found: {0}")]
    QueueNotFound(String),

    /// Queue receiver was dropped.
    #[error("channel closed")]
    ChannelClosed,

    /// Delivery tag unknown or already settled.
    #[error("unknown delivery tag: {0}")]
    UnknownDelivery(u64),
}

/// Trait for publishing messages.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish `envelope` to `exchange` with `routing_key`.
    ///
    /// On the default exchange (`""`) the routing key is the destination queue.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        envelope: Envelope,
    ) -> Result<(), BrokerError>;
}

/// Full broker: publishing plus queue topology and consumption.
#[async_trait]
pub trait MessageBroker: MessagePublisher {
    /// Declare a durable named queue. Idempotent.
    async fn declare_queue(&self, name: &str) -> Result<(), BrokerError>;

    /// Declare a queue with a broker-generated name, for replies.
    async fn declare_exclusive_queue(&self) -> Result<String, BrokerError>;

    /// Route messages published to `exchange` with `routing_key` into `queue`.
    async fn bind_queue(
        &self,
        queue: &str,
        exchange: &str,
        routing_key: &str,
    ) -> Result<(), BrokerError>;

    /// Start consuming `queue`. Several consumers on one queue compete for
    /// messages.
    async fn consume(&self, queue: &str) -> Result<Consumer, BrokerError>;
}
