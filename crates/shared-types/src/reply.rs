//! Reply body published back to the caller of a bus request.
//!
//! ```json
//! {"status":"SUCCESS","correlationId":"abc","data":{"requestTraceId":"t-1"}}
//! {"status":"ERROR","correlationId":"abc","error":{"reason":"InvalidParameter",
//!   "message":"Invalid consumer ID","details":[],"kind":"ValidationError","httpStatus":400}}
//! ```

use crate::correlation::CorrelationId;
use crate::errors::{ErrorInfo, ErrorKind, OperationFailure, OperationResult};
use crate::operation::{Operation, OperationResponse};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReplyStatus {
    Success,
    Error,
}

/// Error section of a reply: the structured error plus its classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyError {
    #[serde(flatten)]
    pub info: ErrorInfo,
    pub kind: ErrorKind,
    pub http_status: u16,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyBody {
    pub status: ReplyStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ReplyError>,
}

impl ReplyBody {
    pub fn success(correlation_id: Option<CorrelationId>, data: serde_json::Value) -> Self {
        Self {
            status: ReplyStatus::Success,
            correlation_id,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(correlation_id: Option<CorrelationId>, failure: &OperationFailure) -> Self {
        Self {
            status: ReplyStatus::Error,
            correlation_id,
            data: None,
            error: Some(ReplyError {
                info: failure.info.clone(),
                kind: failure.kind,
                http_status: failure.status_code(),
            }),
        }
    }

    /// Build the reply for an operation outcome.
    pub fn from_result(
        correlation_id: Option<CorrelationId>,
        result: &OperationResult<OperationResponse>,
    ) -> Self {
        match result {
            Ok(response) => match serde_json::to_value(response) {
                Ok(data) => Self::success(correlation_id, data),
                Err(e) => Self::failure(
                    correlation_id,
                    &OperationFailure::serialization(format!("Failed to encode response: {}", e)),
                ),
            },
            Err(failure) => Self::failure(correlation_id, failure),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == ReplyStatus::Success
    }

    /// Turn a received reply back into a typed outcome for `operation`.
    pub fn into_result(self, operation: Operation) -> OperationResult<OperationResponse> {
        match (self.status, self.data, self.error) {
            (ReplyStatus::Success, Some(data), _) => {
                let bytes = serde_json::to_vec(&data).map_err(|e| {
                    OperationFailure::serialization(format!("Failed to read reply data: {}", e))
                })?;
                OperationResponse::decode(operation, &bytes).map_err(|e| {
                    OperationFailure::serialization(format!("Malformed reply data: {}", e))
                })
            }
            (ReplyStatus::Error, _, Some(error)) => Err(OperationFailure {
                kind: error.kind,
                status: Some(error.http_status),
                info: error.info,
            }),
            _ => Err(OperationFailure::serialization(
                "Reply has neither data nor error",
            )),
        }
    }
}
