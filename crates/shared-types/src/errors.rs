//! # Error Types
//!
//! The structured failure carried by every operation result, and the taxonomy
//! used to classify it.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Well-known `reason` values produced by the bridge itself.
///
/// Upstream-supplied reasons (e.g. `InvalidParameter`) pass through untouched.
pub mod reasons {
    pub const CLIENT_ERROR: &str = "ClientError";
    pub const TRANSPORT_ERROR: &str = "TransportError";
    pub const UPSTREAM_TIMEOUT: &str = "UpstreamTimeout";
    pub const POOL_EXHAUSTED: &str = "PoolExhausted";
    pub const CIRCUIT_OPEN: &str = "CircuitOpen";
    pub const SERIALIZATION_ERROR: &str = "SerializationError";
    pub const INVALID_PAYLOAD: &str = "InvalidPayload";
    pub const CREDENTIAL_ERROR: &str = "CredentialError";
    pub const UNSUPPORTED_OPERATION: &str = "UnsupportedOperation";
    pub const REPLY_TIMEOUT: &str = "ReplyTimeout";
    pub const INTERNAL_ERROR: &str = "InternalError";
}

/// Classification of a failed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Upstream rejected the request as malformed (400, 405, 409, 422, other 4xx)
    ValidationError,
    /// Upstream rejected credentials (401, 403) or credentials were unavailable
    AuthError,
    /// 404
    NotFound,
    /// 429, retried
    RateLimited,
    /// 5xx, retried
    UpstreamError,
    /// Network error, timeout or pool exhaustion, retried
    TransportError,
    /// Payload could not be decoded, never retried
    SerializationError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::ValidationError => "ValidationError",
            ErrorKind::AuthError => "AuthError",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::RateLimited => "RateLimited",
            ErrorKind::UpstreamError => "UpstreamError",
            ErrorKind::TransportError => "TransportError",
            ErrorKind::SerializationError => "SerializationError",
        }
    }

    /// Classify an upstream HTTP error status.
    pub fn from_status(status: u16) -> Self {
        match status {
            401 | 403 => ErrorKind::AuthError,
            404 => ErrorKind::NotFound,
            429 => ErrorKind::RateLimited,
            500..=599 => ErrorKind::UpstreamError,
            _ => ErrorKind::ValidationError,
        }
    }

    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::RateLimited | ErrorKind::UpstreamError | ErrorKind::TransportError
        )
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field-level error detail. Upstream bodies sometimes name the field
/// `location`; both spellings are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetail {
    #[serde(default, alias = "location", skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ErrorDetail {
    pub fn new(
        field: impl Into<String>,
        reason: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            field: Some(field.into()),
            reason: Some(reason.into()),
            message: Some(message.into()),
        }
    }
}

/// Structured error information.
///
/// `reason` is required when parsing an upstream body: a JSON document
/// without it is not treated as an upstream error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub reason: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub details: Vec<ErrorDetail>,
}

impl ErrorInfo {
    pub fn new(reason: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_details(mut self, details: Vec<ErrorDetail>) -> Self {
        self.details = details;
        self
    }
}

/// A failed operation: the structured error plus how it was classified.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} ({reason}): {message}", reason = .info.reason, message = .info.message)]
pub struct OperationFailure {
    pub kind: ErrorKind,
    /// Upstream HTTP status, when the failure came from an HTTP response
    pub status: Option<u16>,
    pub info: ErrorInfo,
}

/// Outcome of one upstream operation.
pub type OperationResult<T> = Result<T, OperationFailure>;

/// Longest body excerpt copied into a synthesized message.
const BODY_EXCERPT_LIMIT: usize = 256;

impl OperationFailure {
    pub fn new(kind: ErrorKind, info: ErrorInfo) -> Self {
        Self {
            kind,
            status: None,
            info,
        }
    }

    /// Failure from an upstream HTTP error response.
    ///
    /// Uses the upstream error body when it parses, otherwise synthesizes one
    /// from the status and a body excerpt with reason `ClientError`.
    pub fn from_upstream(status: u16, body: &[u8]) -> Self {
        let info = serde_json::from_slice::<ErrorInfo>(body)
            .unwrap_or_else(|_| ErrorInfo::new(reasons::CLIENT_ERROR, synthesize_message(status, body)));
        Self {
            kind: ErrorKind::from_status(status),
            status: Some(status),
            info,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::TransportError,
            ErrorInfo::new(reasons::TRANSPORT_ERROR, message),
        )
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::TransportError,
            ErrorInfo::new(reasons::UPSTREAM_TIMEOUT, message),
        )
    }

    pub fn pool_exhausted(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::TransportError,
            ErrorInfo::new(reasons::POOL_EXHAUSTED, message),
        )
    }

    pub fn circuit_open(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UpstreamError,
            ErrorInfo::new(reasons::CIRCUIT_OPEN, message),
        )
    }

    /// Upstream success body that could not be decoded.
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::SerializationError,
            ErrorInfo::new(reasons::SERIALIZATION_ERROR, message),
        )
    }

    /// Inbound payload that could not be decoded.
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::SerializationError,
            ErrorInfo::new(reasons::INVALID_PAYLOAD, message),
        )
    }

    pub fn credentials(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::AuthError,
            ErrorInfo::new(reasons::CREDENTIAL_ERROR, message),
        )
    }

    pub fn unsupported_operation(name: &str) -> Self {
        Self::new(
            ErrorKind::ValidationError,
            ErrorInfo::new(
                reasons::UNSUPPORTED_OPERATION,
                format!("Unsupported operation: {}", name),
            ),
        )
    }

    pub fn reply_timeout(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::TransportError,
            ErrorInfo::new(reasons::REPLY_TIMEOUT, message),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(
            ErrorKind::UpstreamError,
            ErrorInfo::new(reasons::INTERNAL_ERROR, message),
        )
    }

    /// Retryable by kind, except failures raised inside this process, which
    /// repeat identically on every attempt.
    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable() && self.info.reason != reasons::INTERNAL_ERROR
    }

    pub fn reason(&self) -> &str {
        &self.info.reason
    }

    /// HTTP status that best describes this failure.
    ///
    /// The upstream status when there was one, otherwise derived from the
    /// kind and reason.
    pub fn status_code(&self) -> u16 {
        if let Some(status) = self.status {
            return status;
        }
        match (self.kind, self.info.reason.as_str()) {
            (ErrorKind::TransportError, reasons::UPSTREAM_TIMEOUT)
            | (ErrorKind::TransportError, reasons::REPLY_TIMEOUT) => 504,
            (ErrorKind::TransportError, _) => 502,
            (ErrorKind::UpstreamError, reasons::CIRCUIT_OPEN) => 503,
            (ErrorKind::UpstreamError, reasons::INTERNAL_ERROR) => 500,
            (ErrorKind::UpstreamError, _) => 502,
            (ErrorKind::SerializationError, reasons::INVALID_PAYLOAD) => 400,
            (ErrorKind::SerializationError, _) => 502,
            (ErrorKind::ValidationError, _) => 400,
            (ErrorKind::NotFound, _) => 404,
            (ErrorKind::RateLimited, _) => 429,
            (ErrorKind::AuthError, reasons::CREDENTIAL_ERROR) => 500,
            (ErrorKind::AuthError, _) => 401,
        }
    }
}

fn synthesize_message(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        format!("HTTP {}", status)
    } else {
        let excerpt: String = text.chars().take(BODY_EXCERPT_LIMIT).collect();
        format!("HTTP {}: {}", status, excerpt)
    }
}
