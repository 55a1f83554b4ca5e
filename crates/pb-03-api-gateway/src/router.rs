//! Route table, built from the operation table.
//!
//! | Operation | Route |
//! |-----------|-------|
//! | enroll-data | `POST /v1/enroll-data` |
//! | enroll-instruments | `POST /v1/enroll-instruments` |
//! | get-status | `GET /v1/get-status/{requestTraceId}` |
//! | manage-instruments | `PUT /v1/manage-instruments` |
//! | manage-consumer | `PUT /v1/manage-consumer` |
//! | delete-consumer | `POST /v1/delete-consumer` |
//! | delete-instruments | `POST /v1/delete-instruments` |
//! | get-data | `POST /v1/get-data` |

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, on, MethodFilter};
use axum::Router;
use pb_01_upstream_client::HttpUpstreamClient;
use pb_02_rpc_bridge::{BridgeMetrics, Coordinator};
use shared_types::{HttpMethod, Operation};

use crate::domain::HttpConfig;
use crate::handlers;
use crate::middleware::{self, RequestCorrelation};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    /// Present when the bridge runs in this process
    pub bridge_metrics: Option<Arc<BridgeMetrics>>,
    /// Present when the upstream client runs in this process
    pub upstream: Option<Arc<HttpUpstreamClient>>,
    pub service_name: Arc<str>,
}

impl AppState {
    pub fn new(coordinator: Arc<Coordinator>, service_name: &str) -> Self {
        Self {
            coordinator,
            bridge_metrics: None,
            upstream: None,
            service_name: Arc::from(service_name),
        }
    }

    pub fn with_bridge_metrics(mut self, metrics: Arc<BridgeMetrics>) -> Self {
        self.bridge_metrics = Some(metrics);
        self
    }

    pub fn with_upstream(mut self, upstream: Arc<HttpUpstreamClient>) -> Self {
        self.upstream = Some(upstream);
        self
    }
}

/// Route path for `operation`.
pub fn route_path(operation: Operation) -> String {
    match operation {
        Operation::GetStatus => format!("/v1/{}/:request_trace_id", operation.as_str()),
        _ => format!("/v1/{}", operation.as_str()),
    }
}

fn method_filter(method: HttpMethod) -> MethodFilter {
    match method {
        HttpMethod::Get => MethodFilter::GET,
        HttpMethod::Post => MethodFilter::POST,
        HttpMethod::Put => MethodFilter::PUT,
    }
}

/// Full router with the middleware stack applied.
pub fn build_router(state: AppState, config: &HttpConfig) -> Router {
    let mut router = Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics));

    for operation in Operation::ALL {
        let path = route_path(operation);
        let filter = method_filter(operation.method());
        router = match operation {
            Operation::GetStatus => router.route(&path, on(filter, handlers::request_status)),
            _ => router.route(
                &path,
                on(
                    filter,
                    move |State(state): State<AppState>,
                          correlation: RequestCorrelation,
                          body: Bytes| {
                        handlers::handle_operation(state, operation, correlation, body)
                    },
                ),
            ),
        };
    }

    middleware::apply(router, config.request_timeout, config.max_body_bytes).with_state(state)
}
