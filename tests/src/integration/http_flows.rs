//! # HTTP Flows
//!
//! Gateway router → coordinator → `HttpUpstreamClient` → wiremock upstream,
//! in direct mode and through the bus.

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{header, HeaderMap, Request, StatusCode};
    use axum::Router;
    use pb_02_rpc_bridge::{BusClient, Coordinator};
    use pb_03_api_gateway::{build_router, AppState, HttpConfig, PROBLEM_CONTENT_TYPE};
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use wiremock::matchers::{header as header_matcher, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::integration::fixtures::{
        bridge_config, client, flow, upstream_config, ENROLL_PATH, ENROLL_PAYLOAD,
    };

    async fn call(router: Router, request: Request<Body>) -> (StatusCode, HeaderMap, Value) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, headers, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_enroll(correlation_id: &str) -> Request<Body> {
        Request::post("/v1/enroll-data")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-correlation-id", correlation_id)
            .body(Body::from(ENROLL_PAYLOAD))
            .unwrap()
    }

    async fn mock_enroll(server: &MockServer, correlation_id: &str) {
        Mock::given(method("POST"))
            .and(path(ENROLL_PATH))
            .and(header_matcher("x-correlation-id", correlation_id))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"requestTraceId": "trace-http"})),
            )
            .expect(1)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_direct_call_propagates_correlation_id() {
        let server = MockServer::start().await;
        mock_enroll(&server, "http-1").await;

        let upstream = client(upstream_config(&server, 2));
        let state = AppState::new(Arc::new(Coordinator::direct(upstream.clone())), "flows")
            .with_upstream(Arc::clone(&upstream));
        let router = build_router(state.clone(), &HttpConfig::default());

        let (status, headers, body) = call(router, post_enroll("http-1")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requestTraceId"], "trace-http");
        assert_eq!(headers.get("x-correlation-id").unwrap(), "http-1");

        let metrics = Request::get("/metrics").body(Body::empty()).unwrap();
        let (_, _, doc) = call(build_router(state, &HttpConfig::default()), metrics).await;
        assert_eq!(doc["circuits"][0]["operation"], "enroll-data");
        assert_eq!(doc["circuits"][0]["state"], "closed");
    }

    #[tokio::test]
    async fn test_status_path_reaches_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/visaIdCredential/v1/requestStatus/trace-42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "IN_PROGRESS",
                "details": []
            })))
            .expect(1)
            .mount(&server)
            .await;

        let upstream = client(upstream_config(&server, 1));
        let router = build_router(
            AppState::new(Arc::new(Coordinator::direct(upstream)), "flows"),
            &HttpConfig::default(),
        );
        let request = Request::get("/v1/get-status/trace-42")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = call(router, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "IN_PROGRESS");
    }

    #[tokio::test]
    async fn test_upstream_rejection_is_problem_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENROLL_PATH))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "reason": "InvalidParameter",
                "message": "Unsupported intent"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let upstream = client(upstream_config(&server, 3));
        let router = build_router(
            AppState::new(Arc::new(Coordinator::direct(upstream)), "flows"),
            &HttpConfig::default(),
        );
        let (status, headers, body) = call(router, post_enroll("http-422")).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), PROBLEM_CONTENT_TYPE);
        assert_eq!(body["title"], "InvalidParameter");
        assert_eq!(body["detail"], "Unsupported intent");
        assert_eq!(body["correlationId"], "http-422");
    }

    #[tokio::test]
    async fn test_bus_dispatch_through_bridge() {
        let server = MockServer::start().await;
        mock_enroll(&server, "http-bus").await;

        let flow = flow(upstream_config(&server, 1)).await;
        let bus = BusClient::connect(Arc::new(flow.broker.clone()), bridge_config())
            .await
            .unwrap();
        let coordinator = Coordinator::with_bus(flow.upstream.clone(), Arc::new(bus));
        let router = build_router(
            AppState::new(Arc::new(coordinator), "flows")
                .with_bridge_metrics(flow.bridge.metrics()),
            &HttpConfig::default(),
        );

        let (status, headers, body) = call(router, post_enroll("http-bus")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["requestTraceId"], "trace-http");
        assert_eq!(headers.get("x-correlation-id").unwrap(), "http-bus");
        assert_eq!(flow.bridge.metrics().snapshot().messages_received, 1);

        flow.bridge.shutdown().await;
    }
}
