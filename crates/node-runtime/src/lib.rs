//! # Payment Bridge Runtime
//!
//! Loads configuration, installs logging and wires the upstream client, the
//! RPC bridge and the HTTP gateway into one process. The `payment-bridge`
//! binary in `main.rs` is a thin wrapper around [`BridgeRuntime`].
//!
//! ```text
//!  HTTP callers ──→ pb-03 gateway ──→ Coordinator ──┬──→ pb-01 upstream client ──→ payment API
//!                                                   │            ↑
//!  bus producers ──→ request queues ──→ pb-02 bridge ┘────────────┘
//! ```

pub mod config;
pub mod logging;
pub mod runtime;

pub use config::{ConfigError, LogFormat, LoggingConfig, RuntimeConfig, CONFIG_PATH_VAR};
pub use logging::init_tracing;
pub use runtime::{BridgeRuntime, RuntimeError};
