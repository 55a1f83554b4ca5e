//! # PB-01 Upstream Client
//!
//! Typed, authenticated HTTP access to the upstream payment-data API.
//!
//! ## Architecture
//!
//! This crate follows Hexagonal Architecture (Ports & Adapters):
//!
//! - **Domain Layer** (`domain/`): configuration, retry policy, circuit
//!   breaker, log masking. No I/O beyond timers.
//! - **Ports Layer** (`ports/`): trait definitions
//!   - `UpstreamApi`: driving port, one `invoke` per operation
//!   - `CredentialProvider`: driven port, short-lived API key/secret
//! - **Adapters Layer** (`adapters/`): `reqwest`-backed client, request
//!   authenticator, connection gate, credential providers
//!
//! ## Call Path
//!
//! ```text
//! invoke(request, trace_id)
//!   │
//!   ├─ circuit open? ──────────────────────────→ Failure(CircuitOpen)
//!   │
//!   └─ attempt 1..=max_attempts
//!        ├─ ConnectionGate::acquire   (bounded; PoolExhausted beyond queue limit)
//!        ├─ RequestAuthenticator::decorate
//!        │     X-Correlation-Id, Authorization: Basic, X-Request-Timestamp
//!        ├─ HTTP call (connect/read timeouts)
//!        └─ 2xx → Success | 4xx → Failure (no retry)
//!           5xx / 429 / network / timeout → sleep(delay), next attempt
//! ```
//!
//! ## Usage
//!
//! ```ignore
//! use pb_01_upstream_client::{HttpUpstreamClient, StaticCredentialProvider, UpstreamApi, UpstreamConfig};
//!
//! let credentials = Arc::new(StaticCredentialProvider::new("key", "secret"));
//! let client = HttpUpstreamClient::new(UpstreamConfig::default(), credentials)?;
//! let response = client.invoke(&request, &TraceId::generate()).await?;
//! ```

#![warn(clippy::all)]
#![deny(unsafe_code)]

pub mod adapters;
pub mod domain;
pub mod ports;

// Re-exports for public API
pub use adapters::authenticator::RequestAuthenticator;
pub use adapters::connection_gate::ConnectionGate;
pub use adapters::credentials::{EnvCredentialProvider, StaticCredentialProvider};
pub use adapters::http_client::HttpUpstreamClient;
pub use domain::circuit_breaker::{CircuitBreakerConfig, CircuitBreakerManager, CircuitState, CircuitStats};
pub use domain::config::{ConfigError, UpstreamConfig};
pub use domain::masking::{mask_json, mask_payload, mask_value};
pub use domain::retry::{execute_with_retry, RetryPolicy};
pub use ports::inbound::UpstreamApi;
pub use ports::outbound::{AuthContext, CredentialError, CredentialProvider};

/// Errors raised while constructing the client.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to build HTTP client: {0}")]
    ClientBuild(String),
}
