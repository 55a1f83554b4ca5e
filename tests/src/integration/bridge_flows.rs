//! # Bus Request Flows
//!
//! Request envelope on a bridge queue → `HttpUpstreamClient` → wiremock
//! upstream → exactly one correlated reply.
//!
//! | Flow | Test |
//! |------|------|
//! | Success reply, headers sent upstream | `test_success_reply_carries_upstream_data` |
//! | Retry bound on 5xx | `test_server_errors_retried_up_to_bound` |
//! | 4xx not retried, body preserved | `test_client_error_preserved_without_retry` |
//! | Read timeout | `test_timeout_becomes_timeout_reply` |
//! | Circuit opens after repeated failure | `test_circuit_opens_after_failures` |
//! | Concurrent requests stay independent | `test_concurrent_requests_are_independent` |
//! | Failed reply publish does not repeat the call | `test_reply_publish_failure_no_second_call` |
//! | Missing correlation id gets a fresh UUID upstream | `test_uncorrelated_request_gets_generated_trace_id` |

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pb_01_upstream_client::CircuitState;
    use pb_02_rpc_bridge::ipc::ERROR_STATUS_HEADER;
    use serde_json::json;
    use shared_types::errors::reasons;
    use shared_bus::{Envelope, MessagePublisher};
    use shared_types::{CorrelationId, ErrorKind, ReplyStatus};
    use uuid::Uuid;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::integration::fixtures::{
        bridge_config, flow, upstream_config, ENROLL_PATH, ENROLL_PAYLOAD, REPLY_QUEUE,
    };

    fn id(value: &str) -> CorrelationId {
        CorrelationId::parse(value).unwrap()
    }

    #[tokio::test]
    async fn test_success_reply_carries_upstream_data() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENROLL_PATH))
            .and(header("x-correlation-id", "flow-1"))
            .and(header("authorization", "Basic a2V5OnNlY3JldA=="))
            .and(header_exists("x-request-timestamp"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"requestTraceId": "trace-flow"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut flow = flow(upstream_config(&server, 3)).await;
        flow.send("enrollData", &id("flow-1"), ENROLL_PAYLOAD).await;

        let (delivery, reply) = flow.next_reply().await;
        assert_eq!(delivery.envelope.correlation_id, Some(id("flow-1")));
        assert_eq!(reply.status, ReplyStatus::Success);
        assert_eq!(reply.data.unwrap()["requestTraceId"], "trace-flow");
        delivery.ack().await.unwrap();
        flow.assert_no_reply().await;

        flow.bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_server_errors_retried_up_to_bound() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENROLL_PATH))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let mut flow = flow(upstream_config(&server, 3)).await;
        flow.send("enrollData", &id("retry-1"), ENROLL_PAYLOAD).await;

        let (delivery, reply) = flow.next_reply().await;
        assert_eq!(reply.status, ReplyStatus::Error);
        let error = reply.error.unwrap();
        assert_eq!(error.kind, ErrorKind::UpstreamError);
        assert_eq!(error.http_status, 503);
        assert_eq!(delivery.envelope.header(ERROR_STATUS_HEADER), Some("503"));
        assert_eq!(flow.bridge.metrics().snapshot().upstream_calls, 1);

        flow.bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_client_error_preserved_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/visaIdCredential/v1/deleteConsumerInformation"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "reason": "InvalidParameter",
                "message": "Invalid consumer ID",
                "details": [{"location": "consumerInformation.externalConsumerID", "message": "unknown"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut flow = flow(upstream_config(&server, 3)).await;
        flow.send(
            "deleteConsumerInformation",
            &id("del-1"),
            r#"{"intent":{"type":"PRODUCT_CODE","value":"CLICK_TO_PAY"},
                "consumerInformation":{"externalConsumerID":"nope"}}"#,
        )
        .await;

        let (_, reply) = flow.next_reply().await;
        let error = reply.error.unwrap();
        assert_eq!(error.info.reason, "InvalidParameter");
        assert_eq!(error.info.message, "Invalid consumer ID");
        assert_eq!(error.info.details.len(), 1);
        assert_eq!(error.kind, ErrorKind::ValidationError);
        assert_eq!(error.http_status, 400);

        flow.bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_timeout_becomes_timeout_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENROLL_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"requestTraceId": "late"}))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let mut flow = flow(upstream_config(&server, 1)).await;
        flow.send("enrollData", &id("slow-1"), ENROLL_PAYLOAD).await;

        let (_, reply) = flow.next_reply().await;
        let error = reply.error.unwrap();
        assert_eq!(error.info.reason, reasons::UPSTREAM_TIMEOUT);
        assert_eq!(error.kind, ErrorKind::TransportError);
        assert_eq!(error.http_status, 504);

        flow.bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_circuit_opens_after_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENROLL_PATH))
            .respond_with(ResponseTemplate::new(500))
            .expect(5)
            .mount(&server)
            .await;

        let mut flow = flow(upstream_config(&server, 1)).await;
        for i in 0..5 {
            flow.send("enrollData", &id(&format!("cb-{}", i)), ENROLL_PAYLOAD)
                .await;
            let (_, reply) = flow.next_reply().await;
            assert_eq!(reply.error.unwrap().http_status, 500);
        }

        flow.send("enrollData", &id("cb-open"), ENROLL_PAYLOAD).await;
        let (_, reply) = flow.next_reply().await;
        let error = reply.error.unwrap();
        assert_eq!(error.info.reason, reasons::CIRCUIT_OPEN);
        assert_eq!(error.http_status, 503);

        let stats = flow.upstream.circuit_stats();
        let enroll = stats
            .iter()
            .find(|s| s.operation == "enroll-data")
            .unwrap();
        assert_eq!(enroll.state, CircuitState::Open);

        flow.bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_independent() {
        let server = MockServer::start().await;
        for i in 0..8 {
            Mock::given(method("GET"))
                .and(path(format!("/visaIdCredential/v1/requestStatus/t-{}", i)))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({"status": format!("S{}", i)}))
                        .set_delay(Duration::from_millis(10 * (8 - i))),
                )
                .expect(1)
                .mount(&server)
                .await;
        }

        let mut flow = flow(upstream_config(&server, 1)).await;
        for i in 0..8 {
            flow.send(
                "requestStatus",
                &id(&format!("c-{}", i)),
                &json!({"requestTraceId": format!("t-{}", i)}).to_string(),
            )
            .await;
        }

        let mut seen = Vec::new();
        for _ in 0..8 {
            let (delivery, reply) = flow.next_reply().await;
            let correlation = delivery.envelope.correlation_id.clone().unwrap();
            let n = correlation.as_str().trim_start_matches("c-").to_string();
            assert_eq!(reply.data.unwrap()["status"], format!("S{}", n));
            seen.push(n);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 8);

        flow.bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_reply_publish_failure_no_second_call() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENROLL_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"requestTraceId": "once"}))
                    .set_delay(Duration::from_millis(150)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut flow = flow(upstream_config(&server, 1)).await;
        flow.send("enrollData", &id("pub-1"), ENROLL_PAYLOAD).await;

        // Broker goes away while the upstream call is in flight.
        tokio::time::sleep(Duration::from_millis(50)).await;
        flow.broker.set_available(false);
        tokio::time::sleep(Duration::from_millis(250)).await;
        flow.broker.set_available(true);

        let (_, reply) = flow.next_reply().await;
        assert_eq!(reply.status, ReplyStatus::Success);
        assert_eq!(reply.data.unwrap()["requestTraceId"], "once");

        let snapshot = flow.bridge.metrics().snapshot();
        assert_eq!(snapshot.upstream_calls, 1);
        assert!(snapshot.reply_publish_failures >= 1);
        assert!(snapshot.reply_cache_hits >= 1);

        flow.bridge.shutdown().await;
    }

    #[tokio::test]
    async fn test_uncorrelated_request_gets_generated_trace_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(ENROLL_PATH))
            .and(header_exists("x-correlation-id"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"requestTraceId": "trace-gen"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let mut flow = flow(upstream_config(&server, 1)).await;
        let envelope = Envelope::json(ENROLL_PAYLOAD.as_bytes().to_vec()).with_reply_to(REPLY_QUEUE);
        flow.broker
            .publish(&bridge_config().exchange, "enrollData", envelope)
            .await
            .unwrap();

        let (delivery, reply) = flow.next_reply().await;
        assert_eq!(reply.status, ReplyStatus::Success);
        assert_eq!(reply.correlation_id, None);
        delivery.ack().await.unwrap();
        flow.assert_no_reply().await;

        let received = server.received_requests().await.unwrap();
        assert_eq!(received.len(), 1);
        let sent = received[0]
            .headers
            .get("x-correlation-id")
            .unwrap()
            .to_str()
            .unwrap();
        assert!(Uuid::parse_str(sent).is_ok(), "not a UUID: {}", sent);

        flow.bridge.shutdown().await;
    }
}
