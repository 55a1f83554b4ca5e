//! `application/problem+json` error documents.
//!
//! ```json
//! {"type":"https://api.example.dev/errors/upstream-error","title":"InvalidParameter",
//!  "status":400,"detail":"Invalid consumer ID","details":[],"correlationId":"abc"}
//! ```

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use shared_types::errors::reasons;
use shared_types::{CorrelationId, ErrorDetail, ErrorKind, OperationFailure};

use crate::middleware::CORRELATION_HEADER_NAME;

pub const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";

const TYPE_BASE: &str = "https://api.example.dev/errors/";

/// Statuses passed through unchanged
const STANDARD_STATUSES: [u16; 12] = [400, 401, 403, 404, 405, 409, 422, 429, 500, 502, 503, 504];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Problem {
    #[serde(rename = "type")]
    pub problem_type: String,
    pub title: String,
    pub status: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<CorrelationId>,
}

impl Problem {
    pub fn new(slug: &str, title: impl Into<String>, status: u16) -> Self {
        Self {
            problem_type: format!("{}{}", TYPE_BASE, slug),
            title: title.into(),
            status,
            detail: None,
            details: Vec::new(),
            correlation_id: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }

    /// Problem for a failed operation. The title is the failure reason, the
    /// detail its message.
    pub fn from_failure(failure: &OperationFailure) -> Self {
        let status = standard_status(failure);
        let slug = match failure.kind {
            ErrorKind::ValidationError => "validation-error",
            ErrorKind::AuthError if failure.reason() == reasons::CREDENTIAL_ERROR => "server-error",
            ErrorKind::AuthError => "auth-error",
            ErrorKind::NotFound => "not-found",
            ErrorKind::RateLimited => "rate-limited",
            ErrorKind::UpstreamError => "upstream-error",
            ErrorKind::TransportError => "transport-error",
            ErrorKind::SerializationError => "serialization-error",
        };
        let mut problem = Self::new(slug, failure.reason(), status);
        if !failure.info.message.is_empty() {
            problem.detail = Some(failure.info.message.clone());
        }
        problem.details = failure.info.details.clone();
        problem
    }

    /// Request body the gateway itself could not read.
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self::new("bad-request", reasons::INVALID_PAYLOAD, 400).with_detail(detail)
    }
}

/// Status for `failure`: standard statuses pass through, other 4xx become 400
/// and other 5xx become 502.
pub fn standard_status(failure: &OperationFailure) -> u16 {
    let status = failure.status_code();
    if STANDARD_STATUSES.contains(&status) {
        status
    } else if (400..500).contains(&status) {
        400
    } else {
        502
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let correlation = self
            .correlation_id
            .as_ref()
            .and_then(|id| HeaderValue::from_str(id.as_str()).ok());

        let mut response = (status, Json(self)).into_response();
        let headers = response.headers_mut();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static(PROBLEM_CONTENT_TYPE),
        );
        if let Some(value) = correlation {
            headers.insert(CORRELATION_HEADER_NAME, value);
        }
        response
    }
}
