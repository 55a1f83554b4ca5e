#![allow(missing_docs)]

//! PB-02 RPC Bridge - message-queue requests in, correlated replies out.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        RPC BRIDGE (pb-02)                         │
//! ├──────────────────────────────────────────────────────────────────┤
//! │  Request queues (one per operation, bound on the exchange)        │
//! │         │                                                         │
//! │  ┌──────┴──────────────┐     ┌──────────────────────────────┐    │
//! │  │  RequestListener    │────→│  RpcHandler                   │    │
//! │  │  (task per message) │     │  decode → invoke → reply      │    │
//! │  └─────────────────────┘     └──────┬───────────────┬───────┘    │
//! │                                     │               │             │
//! │                              UpstreamApi      ReplyPublisher      │
//! │                              (pb-01)          + ReplyCache        │
//! │                                                                   │
//! │  BusClient: exclusive reply queue + PendingRequestStore           │
//! │  Coordinator: direct or bus dispatch                              │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Delivery Guarantees
//!
//! - Every request carrying a reply queue gets exactly one reply, whose
//!   correlation id equals the request's.
//! - A request whose reply could not be published is requeued; its reply is
//!   cached so the redelivery republishes it without a second upstream call.
//! - Requests without a reply queue are acknowledged once processed.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod coordinator;
pub mod domain;
pub mod ipc;

use std::sync::Arc;
use std::time::Duration;

use pb_01_upstream_client::UpstreamApi;
use shared_bus::{BrokerError, MessageBroker};
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub use coordinator::{Coordinator, DispatchMode};
pub use domain::{BridgeConfig, BridgeMetrics, MetricsSnapshot, ReplyCache, ReplyKey, RequestState};
pub use ipc::{BusClient, ReplyPublisher, RequestListener, RpcHandler};

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("broker error: {0}")]
    Broker(#[from] BrokerError),

    #[error("failed to encode reply: {0}")]
    Encode(String),

    #[error("invalid bridge configuration: {0}")]
    Config(String),
}

/// A running bridge: request consumers plus the reply cache sweeper.
pub struct RpcBridge {
    config: BridgeConfig,
    metrics: Arc<BridgeMetrics>,
    reply_cache: Arc<ReplyCache>,
    shutdown_tx: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl RpcBridge {
    /// Declare the request topology and start consuming.
    pub async fn start<B>(
        broker: B,
        upstream: Arc<dyn UpstreamApi>,
        config: BridgeConfig,
    ) -> Result<Self, BridgeError>
    where
        B: MessageBroker + Clone + 'static,
    {
        config.validate().map_err(BridgeError::Config)?;

        let metrics = Arc::new(BridgeMetrics::new());
        let reply_cache = Arc::new(ReplyCache::new(
            config.reply_cache_ttl,
            config.reply_cache_capacity,
        ));
        let publisher = ReplyPublisher::new(Arc::new(broker.clone()));
        let handler = Arc::new(RpcHandler::new(
            upstream,
            publisher,
            Arc::clone(&reply_cache),
            Arc::clone(&metrics),
            config.request_queue_prefix.clone(),
            config.redelivery_delay,
        ));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let listener = RequestListener::new(Arc::new(broker), handler, config.clone());
        let mut handles = listener.start(shutdown_rx.clone()).await?;
        handles.push(tokio::spawn(reply_cache_sweeper(
            Arc::clone(&reply_cache),
            config.cleanup_interval,
            shutdown_rx,
        )));

        info!(exchange = %config.exchange, "RPC bridge started");
        Ok(Self {
            config,
            metrics,
            reply_cache,
            shutdown_tx,
            handles,
        })
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }

    pub fn metrics(&self) -> Arc<BridgeMetrics> {
        Arc::clone(&self.metrics)
    }

    pub fn reply_cache(&self) -> &ReplyCache {
        &self.reply_cache
    }

    /// Stop consuming and wait for the consume loops to exit. Messages already
    /// handed to a handler task finish on their own.
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(true);
        for handle in self.handles {
            let _ = handle.await;
        }
        info!("RPC bridge stopped");
    }
}

async fn reply_cache_sweeper(
    cache: Arc<ReplyCache>,
    interval: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let removed = cache.remove_expired();
                if removed > 0 {
                    debug!(removed, "Expired cached replies removed");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
}
