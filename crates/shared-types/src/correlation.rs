//! Correlation and trace identifiers.
//!
//! A [`CorrelationId`] is chosen by the caller and echoed on the reply. A
//! [`TraceId`] is what the bridge puts on upstream requests and log lines:
//! the correlation id when one was supplied, otherwise a fresh UUID.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Correlation ID for matching a reply to its request.
///
/// Generated ids use UUID v7 so they sort by creation time in logs.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(String);

impl CorrelationId {
    /// Generate a new correlation ID (UUID v7)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Wrap a caller-supplied id. Returns `None` for empty or blank input.
    pub fn parse(s: &str) -> Option<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for CorrelationId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid.to_string())
    }
}

impl AsRef<str> for CorrelationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Identifier propagated to the upstream API and attached to log spans.
///
/// Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TraceId(String);

impl TraceId {
    /// Resolve the trace id for a request: the correlation id when present,
    /// otherwise a fresh random UUID.
    pub fn resolve(correlation_id: Option<&CorrelationId>) -> Self {
        match correlation_id {
            Some(id) => Self(id.as_str().to_string()),
            None => Self::generate(),
        }
    }

    /// Fresh random trace id
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&CorrelationId> for TraceId {
    fn from(id: &CorrelationId) -> Self {
        Self(id.as_str().to_string())
    }
}
