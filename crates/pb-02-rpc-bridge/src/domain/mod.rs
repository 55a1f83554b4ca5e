//! Domain types for the RPC bridge.

pub mod config;
pub mod metrics;
pub mod pending;
pub mod reply_cache;
pub mod state;

pub use config::BridgeConfig;
pub use metrics::{BridgeMetrics, MetricsSnapshot};
pub use pending::{PendingReply, PendingRequestStore, PendingStatsSnapshot};
pub use reply_cache::{ReplyCache, ReplyKey};
pub use state::RequestState;
