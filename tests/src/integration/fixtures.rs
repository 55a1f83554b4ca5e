//! Shared setup: a wiremock upstream behind `HttpUpstreamClient`, the bridge
//! over an in-memory broker, and a reply queue to read from.

use std::sync::Arc;
use std::time::Duration;

use pb_01_upstream_client::{HttpUpstreamClient, RetryPolicy, StaticCredentialProvider, UpstreamConfig};
use pb_02_rpc_bridge::{BridgeConfig, RpcBridge};
use shared_bus::{Consumer, Delivery, Envelope, InMemoryBroker, MessageBroker, MessagePublisher};
use shared_types::{CorrelationId, ReplyBody};
use wiremock::MockServer;

pub const REPLY_QUEUE: &str = "flow-replies";

pub const ENROLL_PATH: &str = "/visaIdCredential/v1/enrollData";

pub const ENROLL_PAYLOAD: &str = r#"{
    "intent": {"type": "PRODUCT_CODE", "value": "CLICK_TO_PAY"},
    "paymentInstruments": [{"type": "CARD", "accountNumber": "4111111111111111"}],
    "consumerInformation": {"externalConsumerID": "c-1", "firstName": "John"}
}"#;

pub fn upstream_config(server: &MockServer, max_attempts: u32) -> UpstreamConfig {
    UpstreamConfig {
        retry: RetryPolicy::fixed(max_attempts, Duration::from_millis(10)),
        read_timeout: Duration::from_millis(300),
        ..UpstreamConfig::default().with_base_url(server.uri())
    }
}

pub fn client(config: UpstreamConfig) -> Arc<HttpUpstreamClient> {
    Arc::new(
        HttpUpstreamClient::new(config, Arc::new(StaticCredentialProvider::new("key", "secret")))
            .unwrap(),
    )
}

pub fn bridge_config() -> BridgeConfig {
    BridgeConfig {
        reply_timeout: Duration::from_secs(3),
        redelivery_delay: Duration::from_millis(20),
        cleanup_interval: Duration::from_millis(50),
        ..BridgeConfig::default()
    }
}

pub struct Flow {
    pub broker: InMemoryBroker,
    pub bridge: RpcBridge,
    pub replies: Consumer,
    pub upstream: Arc<HttpUpstreamClient>,
}

pub async fn flow(config: UpstreamConfig) -> Flow {
    let upstream = client(config);
    let broker = InMemoryBroker::new();
    broker.declare_queue(REPLY_QUEUE).await.unwrap();
    let replies = broker.consume(REPLY_QUEUE).await.unwrap();
    let bridge = RpcBridge::start(broker.clone(), upstream.clone(), bridge_config())
        .await
        .unwrap();
    Flow {
        broker,
        bridge,
        replies,
        upstream,
    }
}

impl Flow {
    pub async fn send(&self, routing_key: &str, correlation_id: &CorrelationId, payload: &str) {
        let envelope = Envelope::json(payload.as_bytes().to_vec())
            .with_correlation_id(correlation_id.clone())
            .with_reply_to(REPLY_QUEUE);
        self.broker
            .publish(&bridge_config().exchange, routing_key, envelope)
            .await
            .unwrap();
    }

    pub async fn next_reply(&mut self) -> (Delivery, ReplyBody) {
        let delivery = tokio::time::timeout(Duration::from_secs(3), self.replies.recv())
            .await
            .expect("reply within timeout")
            .expect("reply queue open");
        let body = serde_json::from_slice(&delivery.envelope.payload).unwrap();
        (delivery, body)
    }

    pub async fn assert_no_reply(&mut self) {
        let extra = tokio::time::timeout(Duration::from_millis(200), self.replies.recv()).await;
        assert!(extra.is_err(), "unexpected extra reply");
    }
}
