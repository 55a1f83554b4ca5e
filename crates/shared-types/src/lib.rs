//! # Shared Types Crate
//!
//! Types shared by the upstream client, the RPC bridge and the HTTP gateway.
//!
//! ## Design Principles
//!
//! - **Single Source of Truth**: the operation table (routing key, HTTP method,
//!   upstream path) lives in [`operation`] and nowhere else.
//! - **Typed Results**: upstream outcomes are values ([`OperationResult`]),
//!   never panics or untyped strings.
//! - **Opaque Correlation**: correlation ids are caller-chosen strings; only
//!   freshly generated ids are guaranteed to be UUIDs.

pub mod correlation;
pub mod errors;
pub mod models;
pub mod operation;
pub mod reply;

pub use correlation::{CorrelationId, TraceId};
pub use errors::{ErrorDetail, ErrorInfo, ErrorKind, OperationFailure, OperationResult};
pub use models::*;
pub use operation::{HttpMethod, Operation, OperationRequest, OperationResponse, UnknownOperation};
pub use reply::{ReplyBody, ReplyError, ReplyStatus};

/// Header carrying the correlation id on upstream HTTP calls and inbound HTTP requests.
pub const CORRELATION_HEADER: &str = "X-Correlation-Id";
