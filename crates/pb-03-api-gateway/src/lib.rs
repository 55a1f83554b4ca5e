#![allow(missing_docs)]

//! PB-03 API Gateway - the payment operations over plain HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    API GATEWAY (pb-03)                    │
//! ├──────────────────────────────────────────────────────────┤
//! │  Middleware: Correlation → Trace → Timeout → BodyLimit    │
//! │                         │                                 │
//! │  /v1/<operation>   /health   /metrics                     │
//! │         │                                                 │
//! │   Coordinator (pb-02) ── direct ──→ UpstreamApi (pb-01)   │
//! │                       └─ bus ─────→ BusClient → bridge    │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Successes return the upstream body as JSON. Failures return an
//! `application/problem+json` document whose status follows the upstream
//! status where it is a standard one. Every response carries the request's
//! `X-Correlation-Id`, taken from the request when supplied.

#![warn(clippy::all)]
#![deny(unsafe_code)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod domain;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod service;

use std::net::SocketAddr;

use thiserror::Error;

pub use domain::{HttpConfig, Problem, PROBLEM_CONTENT_TYPE};
pub use router::{build_router, route_path, AppState};
pub use service::ApiGatewayService;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid http configuration: {0}")]
    Config(String),

    #[error("failed to bind {0}: {1}")]
    Bind(SocketAddr, #[source] std::io::Error),

    #[error("http server error: {0}")]
    Serve(#[source] std::io::Error),
}
