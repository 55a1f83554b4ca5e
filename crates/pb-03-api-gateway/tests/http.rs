//! HTTP surface tests against a scripted upstream.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use pb_01_upstream_client::UpstreamApi;
use pb_02_rpc_bridge::{BridgeMetrics, Coordinator};
use pb_03_api_gateway::{build_router, AppState, HttpConfig, PROBLEM_CONTENT_TYPE};
use serde_json::{json, Value};
use shared_types::{
    OperationFailure, OperationRequest, OperationResponse, OperationResult, RequestIdResponse,
    RequestStatusResponse, TraceId,
};
use tower::ServiceExt;

/// Records the trace ids it was called with and answers from the request.
#[derive(Default)]
struct EchoUpstream {
    seen: Mutex<Vec<(String, TraceId)>>,
}

#[async_trait]
impl UpstreamApi for EchoUpstream {
    async fn invoke(
        &self,
        request: &OperationRequest,
        trace_id: &TraceId,
    ) -> OperationResult<OperationResponse> {
        self.seen
            .lock()
            .unwrap()
            .push((request.operation().as_str().to_string(), trace_id.clone()));
        match request {
            OperationRequest::GetStatus(q) if q.request_trace_id == "missing" => {
                Err(OperationFailure::from_upstream(
                    404,
                    br#"{"reason":"ResourceNotFound","message":"Unknown request"}"#,
                ))
            }
            OperationRequest::GetStatus(_) => Ok(OperationResponse::Status(RequestStatusResponse {
                status: "COMPLETED".to_string(),
                details: Vec::new(),
                consumer_information: None,
            })),
            OperationRequest::DeleteConsumer(_) => Err(OperationFailure::from_upstream(
                400,
                br#"{"reason":"InvalidParameter","message":"Invalid consumer ID"}"#,
            )),
            OperationRequest::GetData(_) => Err(OperationFailure::timeout("read timed out")),
            _ => Ok(OperationResponse::RequestId(RequestIdResponse {
                request_trace_id: "trace-http".to_string(),
            })),
        }
    }
}

fn app(upstream: Arc<EchoUpstream>) -> Router {
    let coordinator = Arc::new(Coordinator::direct(upstream));
    let state = AppState::new(coordinator, "payment-bridge")
        .with_bridge_metrics(Arc::new(BridgeMetrics::new()));
    build_router(state, &HttpConfig::default())
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, headers, body)
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn id_ref_body() -> Value {
    json!({
        "intent": {"type": "PRODUCT_CODE", "value": "CLICK_TO_PAY"},
        "consumerInformation": {"externalConsumerID": "c-1"}
    })
}

#[tokio::test]
async fn test_health() {
    let (status, _, body) = send(
        app(Arc::default()),
        Request::get("/health").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "UP");
    assert_eq!(body["serviceName"], "payment-bridge");
    assert!(body["timestamp"].as_str().is_some());
    assert!(body["version"].as_str().is_some());
}

#[tokio::test]
async fn test_enroll_success_echoes_correlation_id() {
    let upstream = Arc::new(EchoUpstream::default());
    let mut request = json_request(Method::POST, "/v1/enroll-data", id_ref_body());
    request
        .headers_mut()
        .insert("x-correlation-id", "caller-7".parse().unwrap());

    let (status, headers, body) = send(app(Arc::clone(&upstream)), request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["requestTraceId"], "trace-http");
    assert_eq!(headers.get("x-correlation-id").unwrap(), "caller-7");

    let seen = upstream.seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].0, "enroll-data");
    assert_eq!(seen[0].1.as_str(), "caller-7");
}

#[tokio::test]
async fn test_generated_correlation_id_is_returned() {
    let (status, headers, _) = send(
        app(Arc::default()),
        json_request(Method::PUT, "/v1/manage-consumer", {
            let mut body = id_ref_body();
            body["consumerInformation"]["firstName"] = json!("Jane");
            body
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let id = headers.get("x-correlation-id").unwrap().to_str().unwrap();
    assert!(!id.is_empty());
}

#[tokio::test]
async fn test_status_by_path() {
    let upstream = Arc::new(EchoUpstream::default());
    let (status, _, body) = send(
        app(Arc::clone(&upstream)),
        Request::get("/v1/get-status/trace-1").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "COMPLETED");
    assert_eq!(upstream.seen.lock().unwrap()[0].0, "get-status");
}

#[tokio::test]
async fn test_upstream_not_found_is_problem() {
    let (status, headers, body) = send(
        app(Arc::default()),
        Request::get("/v1/get-status/missing").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), PROBLEM_CONTENT_TYPE);
    assert_eq!(body["title"], "ResourceNotFound");
    assert_eq!(body["detail"], "Unknown request");
    assert_eq!(body["status"], 404);
    assert!(body["correlationId"].as_str().is_some());
}

#[tokio::test]
async fn test_upstream_error_fidelity() {
    let (status, _, body) = send(
        app(Arc::default()),
        json_request(Method::POST, "/v1/delete-consumer", id_ref_body()),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["title"], "InvalidParameter");
    assert_eq!(body["detail"], "Invalid consumer ID");
}

#[tokio::test]
async fn test_timeout_maps_to_gateway_timeout() {
    let (status, _, body) = send(
        app(Arc::default()),
        json_request(Method::POST, "/v1/get-data", id_ref_body()),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["title"], "UpstreamTimeout");
}

#[tokio::test]
async fn test_bad_body_never_reaches_upstream() {
    let upstream = Arc::new(EchoUpstream::default());
    let request = Request::post("/v1/enroll-instruments")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{broken"))
        .unwrap();
    let (status, headers, body) = send(app(Arc::clone(&upstream)), request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), PROBLEM_CONTENT_TYPE);
    assert_eq!(body["title"], "InvalidPayload");
    assert!(upstream.seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_wrong_method_rejected() {
    let (status, _, _) = send(
        app(Arc::default()),
        json_request(Method::GET, "/v1/enroll-data", id_ref_body()),
    )
    .await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_metrics_document() {
    let (status, _, body) = send(
        app(Arc::default()),
        Request::get("/metrics").body(Body::empty()).unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["dispatchMode"], "direct");
    assert_eq!(body["bridge"]["messagesReceived"], 0);
    assert_eq!(body["circuits"], json!([]));
}
