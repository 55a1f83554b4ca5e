//! Lifecycle of one inbound request.
//!
//! ```text
//! Received ──→ Dispatched ──→ Replied
//!     │             │
//!     └─────────────┴──────→ Requeued   (reply could not be published)
//! ```
//!
//! A request that fails before dispatch (unknown routing key, bad payload)
//! goes straight from `Received` to `Replied` with an error reply.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Envelope decoded, trace id resolved
    Received,
    /// Upstream invoked
    Dispatched,
    /// Reply published (or none requested) and inbound message acknowledged
    Replied,
    /// Reply publish failed; inbound message negatively acknowledged for redelivery
    Requeued,
}

impl RequestState {
    pub fn can_transition_to(self, next: RequestState) -> bool {
        use RequestState::*;
        matches!(
            (self, next),
            (Received, Dispatched)
                | (Received, Replied)
                | (Received, Requeued)
                | (Dispatched, Replied)
                | (Dispatched, Requeued)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, RequestState::Replied | RequestState::Requeued)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            RequestState::Received => "received",
            RequestState::Dispatched => "dispatched",
            RequestState::Replied => "replied",
            RequestState::Requeued => "requeued",
        }
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
