//! Domain types for the upstream client.
//!
//! Configuration, retry policy, circuit breaker and log masking. Network I/O
//! lives in the adapters layer.

pub mod circuit_breaker;
pub mod config;
pub mod masking;
pub mod retry;

// Re-exports for convenience
pub use circuit_breaker::{CircuitBreakerConfig, CircuitBreakerManager, CircuitState};
pub use config::{ConfigError, UpstreamConfig};
pub use retry::RetryPolicy;
