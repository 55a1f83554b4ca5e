//! Converts anything that goes wrong while handling a request into a failure reply.

use shared_types::{
    CorrelationId, OperationFailure, OperationResponse, OperationResult, ReplyBody,
    UnknownOperation,
};
use thiserror::Error;

/// Errors raised while handling one inbound request
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    UnsupportedOperation(#[from] UnknownOperation),
    #[error("invalid payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error(transparent)]
    Upstream(#[from] OperationFailure),
    #[error("handler aborted: {0}")]
    Aborted(String),
}

/// The single point where handler errors become structured failures.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExceptionToReplyTranslator;

impl ExceptionToReplyTranslator {
    pub fn translate(&self, error: HandlerError) -> OperationFailure {
        match error {
            HandlerError::UnsupportedOperation(e) => OperationFailure::unsupported_operation(&e.0),
            HandlerError::InvalidPayload(e) => {
                OperationFailure::invalid_payload(format!("Could not decode request: {}", e))
            }
            HandlerError::Upstream(failure) => failure,
            HandlerError::Aborted(message) => OperationFailure::internal(message),
        }
    }

    /// Reply for a handler outcome.
    pub fn to_reply(
        &self,
        correlation_id: Option<CorrelationId>,
        outcome: Result<OperationResponse, HandlerError>,
    ) -> ReplyBody {
        let result: OperationResult<OperationResponse> = outcome.map_err(|e| self.translate(e));
        ReplyBody::from_result(correlation_id, &result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::errors::reasons;
    use shared_types::{ErrorKind, Operation, ReplyStatus};

    #[test]
    fn test_unknown_routing_key_is_validation_error() {
        let failure = ExceptionToReplyTranslator
            .translate(Operation::from_routing_key("teleport").unwrap_err().into());
        assert_eq!(failure.kind, ErrorKind::ValidationError);
        assert_eq!(failure.reason(), reasons::UNSUPPORTED_OPERATION);
        assert!(failure.info.message.contains("teleport"));
    }

    #[test]
    fn test_bad_payload_is_serialization_error() {
        let err = serde_json::from_slice::<serde_json::Value>(b"{oops").unwrap_err();
        let failure = ExceptionToReplyTranslator.translate(err.into());
        assert_eq!(failure.kind, ErrorKind::SerializationError);
        assert_eq!(failure.reason(), reasons::INVALID_PAYLOAD);
        assert_eq!(failure.status_code(), 400);
    }

    #[test]
    fn test_upstream_failure_passes_through() {
        let upstream = OperationFailure::from_upstream(
            400,
            br#"{"reason":"InvalidParameter","message":"Invalid consumer ID"}"#,
        );
        let reply = ExceptionToReplyTranslator
            .to_reply(Some(CorrelationId::new()), Err(upstream.into()));

        assert_eq!(reply.status, ReplyStatus::Error);
        let error = reply.error.unwrap();
        assert_eq!(error.info.reason, "InvalidParameter");
        assert_eq!(error.info.message, "Invalid consumer ID");
        assert_eq!(error.kind, ErrorKind::ValidationError);
        assert_eq!(error.http_status, 400);
    }

    #[test]
    fn test_aborted_handler_is_internal_error() {
        let reply = ExceptionToReplyTranslator
            .to_reply(None, Err(HandlerError::Aborted("task panicked".into())));
        let error = reply.error.unwrap();
        assert_eq!(error.info.reason, reasons::INTERNAL_ERROR);
        assert_eq!(error.http_status, 500);
    }
}
