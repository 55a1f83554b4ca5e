//! Publishes correlated replies to the caller's reply queue.

use std::sync::Arc;

use bytes::Bytes;
use shared_bus::{Envelope, MessagePublisher, DEFAULT_EXCHANGE};
use shared_types::{CorrelationId, ReplyBody};
use tracing::{debug, warn};

use crate::BridgeError;

/// Reply header carrying the error kind
pub const ERROR_TYPE_HEADER: &str = "x-error-type";
/// Reply header carrying the HTTP status used for classification
pub const ERROR_STATUS_HEADER: &str = "x-error-status";

pub const JSON_CONTENT_TYPE: &str = "application/json";

#[derive(Clone)]
pub struct ReplyPublisher {
    publisher: Arc<dyn MessagePublisher>,
}

impl ReplyPublisher {
    pub fn new(publisher: Arc<dyn MessagePublisher>) -> Self {
        Self { publisher }
    }

    /// Publish `reply` to `reply_to` on the default exchange.
    pub async fn publish(
        &self,
        correlation_id: Option<&CorrelationId>,
        reply_to: &str,
        reply: &ReplyBody,
    ) -> Result<(), BridgeError> {
        let envelope = reply_envelope(correlation_id, reply)?;

        match self.publisher.publish(DEFAULT_EXCHANGE, reply_to, envelope).await {
            Ok(()) => {
                debug!(
                    correlation_id = correlation_id.map(|c| c.as_str()),
                    reply_to,
                    status = ?reply.status,
                    "Reply published"
                );
                Ok(())
            }
            Err(e) => {
                warn!(
                    correlation_id = correlation_id.map(|c| c.as_str()),
                    reply_to,
                    error = %e,
                    "Failed to publish reply"
                );
                Err(e.into())
            }
        }
    }
}

/// Envelope for `reply`: JSON body, correlation id, and error headers on failure.
pub fn reply_envelope(
    correlation_id: Option<&CorrelationId>,
    reply: &ReplyBody,
) -> Result<Envelope, BridgeError> {
    let body = serde_json::to_vec(reply).map_err(|e| BridgeError::Encode(e.to_string()))?;
    let mut envelope = Envelope::new(Bytes::from(body)).with_content_type(JSON_CONTENT_TYPE);
    if let Some(id) = correlation_id {
        envelope = envelope.with_correlation_id(id.clone());
    }
    if let Some(error) = &reply.error {
        envelope = envelope
            .with_header(ERROR_TYPE_HEADER, error.kind.as_str())
            .with_header(ERROR_STATUS_HEADER, error.http_status.to_string());
    }
    Ok(envelope)
}
