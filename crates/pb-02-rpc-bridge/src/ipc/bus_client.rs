//! Asynchronous caller side: publish a request on the bus and await its
//! correlated reply on a private reply queue.

use std::sync::Arc;

use shared_bus::{Consumer, Envelope, MessageBroker};
use shared_types::{
    CorrelationId, OperationFailure, OperationRequest, OperationResponse, OperationResult,
    ReplyBody,
};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::pending::{expiry_sweeper, PendingRequestStore};
use crate::domain::BridgeConfig;
use crate::BridgeError;

pub struct BusClient {
    broker: Arc<dyn MessageBroker>,
    pending: Arc<PendingRequestStore>,
    reply_queue: String,
    config: BridgeConfig,
    tasks: Vec<JoinHandle<()>>,
}

impl BusClient {
    /// Declare an exclusive reply queue and start listening on it.
    pub async fn connect(
        broker: Arc<dyn MessageBroker>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError> {
        let reply_queue = broker.declare_exclusive_queue().await?;
        let consumer = broker.consume(&reply_queue).await?;
        let pending = Arc::new(PendingRequestStore::new(config.reply_timeout));

        let tasks = vec![
            tokio::spawn(reply_listener(consumer, Arc::clone(&pending))),
            tokio::spawn(expiry_sweeper(Arc::clone(&pending), config.cleanup_interval)),
        ];
        info!(reply_queue = %reply_queue, "Bus client connected");

        Ok(Self {
            broker,
            pending,
            reply_queue,
            config,
            tasks,
        })
    }

    pub fn reply_queue(&self) -> &str {
        &self.reply_queue
    }

    pub fn pending(&self) -> &PendingRequestStore {
        &self.pending
    }

    /// Publish `request` with `correlation_id` and wait for the reply.
    ///
    /// No reply within the reply timeout yields a `ReplyTimeout` transport failure.
    pub async fn call(
        &self,
        request: &OperationRequest,
        correlation_id: CorrelationId,
    ) -> OperationResult<OperationResponse> {
        let operation = request.operation();
        let payload = request.to_payload().map_err(|e| {
            OperationFailure::serialization(format!("could not encode {} request: {}", operation, e))
        })?;

        let rx = self
            .pending
            .register(correlation_id.clone(), operation, Some(self.config.reply_timeout));

        let envelope = Envelope::json(payload)
            .with_correlation_id(correlation_id.clone())
            .with_reply_to(self.reply_queue.clone());
        if let Err(e) = self
            .broker
            .publish(&self.config.exchange, operation.routing_key(), envelope)
            .await
        {
            self.pending.cancel(&correlation_id);
            return Err(OperationFailure::transport(format!(
                "could not publish {} request: {}",
                operation, e
            )));
        }
        debug!(correlation_id = %correlation_id, operation = %operation, "Request published");

        match tokio::time::timeout(self.config.reply_timeout, rx).await {
            Ok(Ok(delivered)) => delivered.reply.into_result(operation),
            Ok(Err(_)) => Err(OperationFailure::internal("reply channel closed")),
            Err(_) => {
                self.pending.expire(&correlation_id);
                warn!(
                    correlation_id = %correlation_id,
                    operation = %operation,
                    timeout_ms = self.config.reply_timeout.as_millis() as u64,
                    "No reply within timeout"
                );
                Err(OperationFailure::reply_timeout(format!(
                    "no reply for {} within {:?}",
                    operation, self.config.reply_timeout
                )))
            }
        }
    }
}

impl Drop for BusClient {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

/// Route replies on the private queue to their waiters.
async fn reply_listener(mut consumer: Consumer, pending: Arc<PendingRequestStore>) {
    while let Some(delivery) = consumer.recv().await {
        match serde_json::from_slice::<ReplyBody>(&delivery.envelope.payload) {
            Ok(reply) => {
                let id = delivery
                    .envelope
                    .correlation_id
                    .clone()
                    .or_else(|| reply.correlation_id.clone());
                match id {
                    Some(id) => {
                        pending.complete(&id, reply);
                    }
                    None => warn!("Reply without correlation id dropped"),
                }
            }
            Err(e) => warn!(error = %e, "Undecodable reply dropped"),
        }
        if let Err(e) = delivery.ack().await {
            warn!(error = %e, "Failed to acknowledge reply");
        }
    }
    debug!("Reply listener stopped");
}
