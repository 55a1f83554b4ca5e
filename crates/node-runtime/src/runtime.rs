//! Component wiring and lifecycle.
//!
//! ## Startup Sequence
//!
//! 1. Credential provider (static pair or environment variables)
//! 2. Upstream HTTP client
//! 3. Broker and RPC bridge consumers
//! 4. Coordinator (direct, or through the bus with its own reply queue)
//! 5. HTTP gateway
//!
//! Shutdown runs in reverse: the gateway drains, then the bridge stops consuming.

use std::sync::Arc;

use axum::Router;
use pb_01_upstream_client::{
    CredentialProvider, EnvCredentialProvider, HttpUpstreamClient, StaticCredentialProvider,
    UpstreamApi, UpstreamError,
};
use pb_02_rpc_bridge::{
    BridgeError, BridgeMetrics, BusClient, Coordinator, DispatchMode, RpcBridge,
};
use pb_03_api_gateway::{ApiGatewayService, AppState, GatewayError};
use shared_bus::InMemoryBroker;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::config::{ConfigError, CredentialsConfig, RuntimeConfig};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("upstream client: {0}")]
    Upstream(#[from] UpstreamError),
    #[error("bridge: {0}")]
    Bridge(#[from] BridgeError),
    #[error("gateway: {0}")]
    Gateway(#[from] GatewayError),
}

/// The running payment bridge.
pub struct BridgeRuntime {
    config: RuntimeConfig,
    broker: InMemoryBroker,
    upstream: Arc<HttpUpstreamClient>,
    bridge: RpcBridge,
    coordinator: Arc<Coordinator>,
    router: Router,
    shutdown_tx: watch::Sender<bool>,
    server: JoinHandle<Result<(), GatewayError>>,
}

impl BridgeRuntime {
    /// Wire every component and start serving.
    pub async fn start(config: RuntimeConfig) -> Result<Self, RuntimeError> {
        config.validate()?;
        info!(
            upstream = %config.upstream.base_url,
            exchange = %config.bridge.exchange,
            dispatch_mode = ?config.http.dispatch_mode,
            "Starting payment bridge"
        );

        let credentials = credential_provider(&config.credentials);
        let upstream = Arc::new(HttpUpstreamClient::new(
            config.upstream.clone(),
            credentials,
        )?);
        let upstream_api: Arc<dyn UpstreamApi> = upstream.clone();

        let broker = InMemoryBroker::new();
        let bridge =
            RpcBridge::start(broker.clone(), Arc::clone(&upstream_api), config.bridge.clone())
                .await?;

        let coordinator = match config.http.dispatch_mode {
            DispatchMode::Direct => Coordinator::direct(Arc::clone(&upstream_api)),
            DispatchMode::Bus => {
                let bus = BusClient::connect(Arc::new(broker.clone()), config.bridge.clone())
                    .await?;
                Coordinator::with_bus(Arc::clone(&upstream_api), Arc::new(bus))
            }
        };
        let coordinator = Arc::new(coordinator);

        let state = AppState::new(Arc::clone(&coordinator), &config.http.service_name)
            .with_bridge_metrics(bridge.metrics())
            .with_upstream(Arc::clone(&upstream));
        let gateway = ApiGatewayService::new(config.http.clone(), state)?;
        let router = gateway.router();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(async move {
            let result = gateway.serve(shutdown_rx).await;
            if let Err(e) = &result {
                error!(error = %e, "HTTP server stopped with an error");
            }
            result
        });

        info!("Payment bridge running");
        Ok(Self {
            config,
            broker,
            upstream,
            bridge,
            coordinator,
            router,
            shutdown_tx,
            server,
        })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Broker the bridge consumes from. Producers in this process publish here.
    pub fn broker(&self) -> &InMemoryBroker {
        &self.broker
    }

    pub fn upstream(&self) -> Arc<HttpUpstreamClient> {
        Arc::clone(&self.upstream)
    }

    pub fn coordinator(&self) -> Arc<Coordinator> {
        Arc::clone(&self.coordinator)
    }

    pub fn bridge_metrics(&self) -> Arc<BridgeMetrics> {
        self.bridge.metrics()
    }

    /// The gateway's router, for in-process requests.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Whether the HTTP server task has exited.
    pub fn server_finished(&self) -> bool {
        self.server.is_finished()
    }

    /// Drain the HTTP server, then stop the bridge consumers.
    pub async fn shutdown(self) -> Result<(), RuntimeError> {
        info!("Initiating graceful shutdown");
        if self.shutdown_tx.send(true).is_err() {
            warn!("HTTP server already stopped");
        }

        let served = match self.server.await {
            Ok(result) => result.map_err(RuntimeError::from),
            Err(e) => {
                error!(error = %e, "HTTP server task failed");
                Ok(())
            }
        };

        self.bridge.shutdown().await;
        info!("Shutdown complete");
        served
    }
}

fn credential_provider(config: &CredentialsConfig) -> Arc<dyn CredentialProvider> {
    match config.static_pair() {
        Some((key, secret)) => {
            info!("Using configured static credentials");
            Arc::new(StaticCredentialProvider::new(key, secret))
        }
        None => {
            info!(
                key_var = %config.api_key_env,
                secret_var = %config.api_secret_env,
                "Reading credentials from the environment"
            );
            Arc::new(EnvCredentialProvider::new(
                config.api_key_env.clone(),
                config.api_secret_env.clone(),
            ))
        }
    }
}
