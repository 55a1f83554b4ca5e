//! # payment-bridge
//!
//! Runs the message-queue RPC bridge and its HTTP gateway until Ctrl+C.
//!
//! Configuration comes from the TOML file named by `PB_CONFIG` (defaults when
//! unset) with `PB_*` environment overrides. `RUST_LOG` overrides the
//! configured log filter.

use anyhow::{Context, Result};
use node_runtime::{init_tracing, BridgeRuntime, RuntimeConfig};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    let config = RuntimeConfig::load().context("Failed to load configuration")?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    let runtime = BridgeRuntime::start(config)
        .await
        .context("Failed to start payment bridge")?;

    info!("Payment bridge is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    runtime.shutdown().await.context("Shutdown failed")?;
    Ok(())
}
