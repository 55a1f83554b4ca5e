//! HTTP server lifecycle.

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::info;

use crate::domain::HttpConfig;
use crate::router::{build_router, AppState};
use crate::GatewayError;

pub struct ApiGatewayService {
    config: HttpConfig,
    router: Router,
}

impl ApiGatewayService {
    pub fn new(config: HttpConfig, state: AppState) -> Result<Self, GatewayError> {
        config.validate().map_err(GatewayError::Config)?;
        let router = build_router(state, &config);
        Ok(Self { config, router })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Serve until `shutdown` flips to `true`, then drain in-flight requests.
    pub async fn serve(self, mut shutdown: watch::Receiver<bool>) -> Result<(), GatewayError> {
        let listener = TcpListener::bind(self.config.bind)
            .await
            .map_err(|e| GatewayError::Bind(self.config.bind, e))?;
        let local = listener.local_addr().map_err(GatewayError::Serve)?;
        info!(addr = %local, "HTTP server listening");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                while shutdown.changed().await.is_ok() {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            })
            .await
            .map_err(GatewayError::Serve)?;

        info!("HTTP server stopped");
        Ok(())
    }
}
