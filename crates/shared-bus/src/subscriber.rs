//! # Consumer Side
//!
//! Deliveries handed to consumers and the acknowledgement contract.

use crate::envelope::Envelope;
use crate::publisher::BrokerError;
use async_trait::async_trait;
use futures::stream::{Stream, StreamExt};
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

/// Settles deliveries on behalf of a broker.
#[async_trait]
pub trait Acknowledger: Send + Sync {
    async fn ack(&self, delivery_tag: u64) -> Result<(), BrokerError>;
    async fn nack(&self, delivery_tag: u64, requeue: bool) -> Result<(), BrokerError>;
}

/// One message handed to a consumer.
///
/// Settling consumes the delivery, so a delivery can only be acknowledged or
/// negatively acknowledged once.
pub struct Delivery {
    pub envelope: Envelope,
    pub exchange: String,
    pub routing_key: String,
    pub queue: String,
    pub delivery_tag: u64,
    pub redelivered: bool,
    acker: Arc<dyn Acknowledger>,
}

impl Delivery {
    pub fn new(
        envelope: Envelope,
        exchange: impl Into<String>,
        routing_key: impl Into<String>,
        queue: impl Into<String>,
        delivery_tag: u64,
        redelivered: bool,
        acker: Arc<dyn Acknowledger>,
    ) -> Self {
        Self {
            envelope,
            exchange: exchange.into(),
            routing_key: routing_key.into(),
            queue: queue.into(),
            delivery_tag,
            redelivered,
            acker,
        }
    }

    pub async fn ack(self) -> Result<(), BrokerError> {
        self.acker.ack(self.delivery_tag).await
    }

    pub async fn nack(self, requeue: bool) -> Result<(), BrokerError> {
        self.acker.nack(self.delivery_tag, requeue).await
    }
}

impl fmt::Debug for Delivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Delivery")
            .field("envelope", &self.envelope)
            .field("exchange", &self.exchange)
            .field("routing_key", &self.routing_key)
            .field("queue", &self.queue)
            .field("delivery_tag", &self.delivery_tag)
            .field("redelivered", &self.redelivered)
            .finish()
    }
}

/// A consumer handle on one queue.
///
/// Implements `Stream` for use with stream combinators.
pub struct Consumer {
    queue: String,
    inner: Pin<Box<dyn Stream<Item = Delivery> + Send>>,
}

impl Consumer {
    pub fn new(
        queue: impl Into<String>,
        stream: impl Stream<Item = Delivery> + Send + 'static,
    ) -> Self {
        Self {
            queue: queue.into(),
            inner: Box::pin(stream),
        }
    }

    /// Receive the next delivery.
    ///
    /// # Returns
    ///
    /// - `Some(delivery)` - The next message
    /// - `None` - The queue was closed
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.inner.next().await
    }

    pub fn queue(&self) -> &str {
        &self.queue
    }
}

impl Stream for Consumer {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for Consumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer").field("queue", &self.queue).finish()
    }
}
