//! Request handlers: one per operation, plus health and metrics.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use pb_01_upstream_client::mask_payload;
use serde_json::json;
use shared_types::{Operation, OperationRequest, RequestStatusQuery};
use tracing::{debug, info, warn};

use crate::domain::Problem;
use crate::middleware::RequestCorrelation;
use crate::router::AppState;

/// Decode `body` for `operation` and run it.
pub async fn handle_operation(
    state: AppState,
    operation: Operation,
    RequestCorrelation(correlation_id): RequestCorrelation,
    body: Bytes,
) -> Response {
    debug!(operation = %operation, payload = %mask_payload(&body), "HTTP request body");
    let request = match OperationRequest::decode(operation, &body) {
        Ok(request) => request,
        Err(e) => {
            warn!(operation = %operation, error = %e, "Rejected undecodable request body");
            return Problem::bad_request(format!("Could not decode {} request: {}", operation, e))
                .with_correlation_id(correlation_id)
                .into_response();
        }
    };
    execute(state, request, correlation_id).await
}

/// `GET .../get-status/{request_trace_id}`
pub async fn request_status(
    State(state): State<AppState>,
    correlation: RequestCorrelation,
    Path(request_trace_id): Path<String>,
) -> Response {
    let request = OperationRequest::GetStatus(RequestStatusQuery { request_trace_id });
    execute(state, request, correlation.0).await
}

async fn execute(
    state: AppState,
    request: OperationRequest,
    correlation_id: shared_types::CorrelationId,
) -> Response {
    let operation = request.operation();
    info!(operation = %operation, "Dispatching HTTP request");
    match state
        .coordinator
        .execute(request, Some(correlation_id.clone()))
        .await
    {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(failure) => {
            warn!(operation = %operation, error = %failure, "Operation failed");
            Problem::from_failure(&failure)
                .with_correlation_id(correlation_id)
                .into_response()
        }
    }
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    debug!("Health check");
    Json(json!({
        "status": "UP",
        "timestamp": chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        "version": env!("CARGO_PKG_VERSION"),
        "serviceName": state.service_name.as_ref(),
    }))
}

/// `GET /metrics`
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    let bridge = state.bridge_metrics.as_ref().map(|m| m.snapshot());
    let circuits = state
        .upstream
        .as_ref()
        .map(|client| client.circuit_stats())
        .unwrap_or_default();
    Json(json!({
        "dispatchMode": state.coordinator.mode(),
        "bridge": bridge,
        "circuits": circuits,
    }))
}
