//! # Shared Bus - Message Queue Contract
//!
//! Request/reply messaging between callers and the bridge.
//!
//! ## Model
//!
//! ```text
//! ┌──────────┐  publish(exchange, routing key)  ┌──────────────┐
//! │  Caller  │ ───────────────────────────────→ │   Exchange   │
//! │          │                                  └──────┬───────┘
//! │          │                                         │ binding
//! │          │                                         ▼
//! │          │                                  ┌──────────────┐   consume()   ┌────────┐
//! │          │                                  │ Request Queue│ ────────────→ │ Bridge │
//! │          │                                  └──────────────┘               └───┬────┘
//! │          │       publish("", reply_to)                                         │
//! │          │ ←───────────────── Reply Queue ←────────────────────────────────────┘
//! └──────────┘
//! ```
//!
//! - Publishing to the default exchange (`""`) routes directly to the queue
//!   named by the routing key.
//! - Every [`Delivery`] must be acknowledged or negatively acknowledged exactly
//!   once. A negative acknowledgement with requeue redelivers the message with
//!   `redelivered = true`.
//! - Messages routed nowhere are dropped, matching broker semantics for
//!   non-mandatory publishes.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod envelope;
pub mod memory;
pub mod publisher;
pub mod subscriber;

// Re-export main types
pub use envelope::{Envelope, Headers};
pub use memory::{BrokerStats, InMemoryBroker};
pub use publisher::{BrokerError, MessageBroker, MessagePublisher};
pub use subscriber::{Acknowledger, Consumer, Delivery};

/// Name of the default exchange.
pub const DEFAULT_EXCHANGE: &str = "";

/// Maximum messages buffered per queue before publishers wait.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
