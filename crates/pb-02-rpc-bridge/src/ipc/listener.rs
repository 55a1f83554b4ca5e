//! Request queue topology and consume loops.

use std::sync::Arc;

use shared_bus::{Consumer, MessageBroker};
use shared_types::Operation;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::domain::BridgeConfig;
use crate::ipc::handler::RpcHandler;
use crate::BridgeError;

/// Declare one request queue per operation and bind it on the exchange under
/// the operation's routing key. Returns the queue names.
pub async fn declare_topology(
    broker: &dyn MessageBroker,
    config: &BridgeConfig,
) -> Result<Vec<String>, BridgeError> {
    let mut queues = Vec::with_capacity(Operation::ALL.len());
    for operation in Operation::ALL {
        let queue = config.queue_name(operation);
        broker.declare_queue(&queue).await?;
        broker
            .bind_queue(&queue, &config.exchange, operation.routing_key())
            .await?;
        debug!(queue = %queue, exchange = %config.exchange, routing_key = operation.routing_key(), "Request queue bound");
        queues.push(queue);
    }
    Ok(queues)
}

/// Consumes every request queue and hands each delivery to the handler on
/// its own task.
pub struct RequestListener {
    broker: Arc<dyn MessageBroker>,
    handler: Arc<RpcHandler>,
    config: BridgeConfig,
}

impl RequestListener {
    pub fn new(
        broker: Arc<dyn MessageBroker>,
        handler: Arc<RpcHandler>,
        config: BridgeConfig,
    ) -> Self {
        Self {
            broker,
            handler,
            config,
        }
    }

    /// Declare the topology and start one consume loop per queue.
    pub async fn start(
        &self,
        shutdown: watch::Receiver<bool>,
    ) -> Result<Vec<JoinHandle<()>>, BridgeError> {
        let queues = declare_topology(self.broker.as_ref(), &self.config).await?;

        let mut handles = Vec::with_capacity(queues.len());
        for queue in queues {
            let consumer = self.broker.consume(&queue).await?;
            handles.push(tokio::spawn(consume_loop(
                consumer,
                Arc::clone(&self.handler),
                shutdown.clone(),
            )));
        }

        info!(
            exchange = %self.config.exchange,
            queues = handles.len(),
            "Request listener started"
        );
        Ok(handles)
    }
}

async fn consume_loop(
    mut consumer: Consumer,
    handler: Arc<RpcHandler>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            delivery = consumer.recv() => {
                let Some(delivery) = delivery else {
                    info!(queue = consumer.queue(), "Request queue closed");
                    break;
                };
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    handler.handle(delivery).await;
                });
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(queue = consumer.queue(), "Request listener stopping");
                    break;
                }
            }
        }
    }
}
