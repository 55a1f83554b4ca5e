//! Driving port for the upstream operation set.

use async_trait::async_trait;
use shared_types::{OperationRequest, OperationResponse, OperationResult, TraceId};

/// Typed access to the upstream API.
///
/// Implementations are stateless across calls and safe to share between
/// tasks. Every failure is returned as a value; nothing is recovered silently.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Perform `request`, retrying transient failures per the operation's
    /// retry policy. `trace_id` is sent as `X-Correlation-Id` on every attempt.
    async fn invoke(
        &self,
        request: &OperationRequest,
        trace_id: &TraceId,
    ) -> OperationResult<OperationResponse>;
}
