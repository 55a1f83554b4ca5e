//! # Message Envelope
//!
//! Transport properties carried alongside every payload.

use bytes::Bytes;
use shared_types::CorrelationId;
use std::collections::BTreeMap;

/// Application headers.
pub type Headers = BTreeMap<String, String>;

/// A message as seen by publishers and consumers.
///
/// `reply_to` names the queue a reply should be published to. Messages
/// without it are fire-and-forget. `message_id` is stamped by the broker on
/// publish when the producer left it empty and survives redelivery.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Envelope {
    pub message_id: Option<String>,
    pub correlation_id: Option<CorrelationId>,
    pub reply_to: Option<String>,
    pub content_type: Option<String>,
    pub headers: Headers,
    pub payload: Bytes,
}

impl Envelope {
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
            ..Default::default()
        }
    }

    /// JSON payload with `application/json` content type.
    pub fn json(payload: impl Into<Bytes>) -> Self {
        Self::new(payload).with_content_type("application/json")
    }

    pub fn with_message_id(mut self, id: impl Into<String>) -> Self {
        self.message_id = Some(id.into());
        self
    }

    pub fn with_correlation_id(mut self, id: CorrelationId) -> Self {
        self.correlation_id = Some(id);
        self
    }

    pub fn with_reply_to(mut self, queue: impl Into<String>) -> Self {
        self.reply_to = Some(queue.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// `reply_to` if present and non-blank
    pub fn reply_queue(&self) -> Option<&str> {
        self.reply_to
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
    }

    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers.get(key).map(String::as_str)
    }
}
