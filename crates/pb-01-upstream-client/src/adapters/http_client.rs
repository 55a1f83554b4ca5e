//! `reqwest`-backed implementation of [`UpstreamApi`].

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use shared_types::{
    HttpMethod, Operation, OperationFailure, OperationRequest, OperationResponse, OperationResult,
    TraceId,
};
use tracing::{debug, info, warn};
use url::Url;

use crate::adapters::authenticator::RequestAuthenticator;
use crate::adapters::connection_gate::ConnectionGate;
use crate::domain::circuit_breaker::{CircuitBreakerManager, CircuitStats};
use crate::domain::config::UpstreamConfig;
use crate::domain::masking::mask_json;
use crate::domain::retry::execute_with_retry;
use crate::ports::inbound::UpstreamApi;
use crate::ports::outbound::CredentialProvider;
use crate::UpstreamError;

/// Upstream API client. Cheap to share behind an `Arc`; holds no per-request state.
pub struct HttpUpstreamClient {
    http: reqwest::Client,
    base_url: Url,
    config: UpstreamConfig,
    authenticator: RequestAuthenticator,
    gate: ConnectionGate,
    circuit_breaker: CircuitBreakerManager,
}

impl HttpUpstreamClient {
    /// Build a client. Fails on invalid configuration.
    pub fn new(
        config: UpstreamConfig,
        credentials: Arc<dyn CredentialProvider>,
    ) -> Result<Self, UpstreamError> {
        config.validate()?;
        let base_url = config.parsed_base_url()?;

        let http = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .timeout(config.read_timeout)
            .pool_max_idle_per_host(config.max_connections)
            .default_headers({
                let mut headers = HeaderMap::new();
                headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
                headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                headers
            })
            .build()
            .map_err(|e| UpstreamError::ClientBuild(e.to_string()))?;

        Ok(Self {
            http,
            base_url,
            gate: ConnectionGate::new(config.max_connections, config.max_queued_requests),
            circuit_breaker: CircuitBreakerManager::new(config.circuit_breaker.clone()),
            authenticator: RequestAuthenticator::new(credentials),
            config,
        })
    }

    pub fn config(&self) -> &UpstreamConfig {
        &self.config
    }

    pub fn circuit_stats(&self) -> Vec<CircuitStats> {
        self.circuit_breaker.stats()
    }

    /// Full URL for `request`: base path, operation path, then the path
    /// parameter as an escaped segment.
    fn url_for(&self, request: &OperationRequest) -> OperationResult<Url> {
        let operation = request.operation();
        let mut url = self.base_url.clone();
        let path = format!(
            "{}{}",
            self.base_url.path().trim_end_matches('/'),
            operation.path()
        );
        url.set_path(&path);

        if let Some(param) = request.path_param() {
            url.path_segments_mut()
                .map_err(|_| OperationFailure::internal("base url cannot carry a path"))?
                .push(param);
        }
        Ok(url)
    }

    /// One attempt: admission, decoration, exchange, classification.
    async fn attempt(
        &self,
        request: &OperationRequest,
        body: Option<&serde_json::Value>,
        url: &Url,
        trace_id: &TraceId,
        attempt: u32,
    ) -> OperationResult<OperationResponse> {
        let operation = request.operation();
        let _permit = self.gate.acquire().await?;

        let method = match operation.method() {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
        };
        let mut builder = self.http.request(method, url.clone());
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let http_request = builder
            .build()
            .map_err(|e| OperationFailure::internal(format!("failed to build request: {}", e)))?;
        let http_request = self
            .authenticator
            .decorate(http_request, trace_id)
            .await
            .map_err(|e| OperationFailure::credentials(e.to_string()))?;

        let started = Instant::now();
        let response = self
            .http
            .execute(http_request)
            .await
            .map_err(|e| classify_transport(operation, &e))?;
        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| classify_transport(operation, &e))?;

        info!(
            operation = %operation,
            trace_id = %trace_id,
            attempt,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Upstream call completed"
        );

        if status.is_success() {
            OperationResponse::decode(operation, &bytes).map_err(|e| {
                warn!(operation = %operation, trace_id = %trace_id, error = %e, "Undecodable upstream success body");
                OperationFailure::serialization(format!(
                    "could not decode {} response: {}",
                    operation, e
                ))
            })
        } else {
            Err(OperationFailure::from_upstream(status.as_u16(), &bytes))
        }
    }
}

fn classify_transport(operation: Operation, error: &reqwest::Error) -> OperationFailure {
    if error.is_timeout() {
        OperationFailure::timeout(format!("{} timed out: {}", operation, error))
    } else {
        OperationFailure::transport(format!("{} failed: {}", operation, error))
    }
}

#[async_trait]
impl UpstreamApi for HttpUpstreamClient {
    async fn invoke(
        &self,
        request: &OperationRequest,
        trace_id: &TraceId,
    ) -> OperationResult<OperationResponse> {
        let operation = request.operation();

        if !self.circuit_breaker.should_allow(operation) {
            return Err(OperationFailure::circuit_open(format!(
                "circuit for {} is open",
                operation
            )));
        }

        let url = self.url_for(request)?;
        let body = request.body().map_err(|e| {
            OperationFailure::serialization(format!("could not encode {} request: {}", operation, e))
        })?;
        if let Some(body) = &body {
            debug!(operation = %operation, trace_id = %trace_id, body = %mask_json(body), "Upstream request body");
        }

        let policy = self.config.retry_policy_for(operation);
        let result = execute_with_retry(policy, operation, trace_id, |attempt| {
            self.attempt(request, body.as_ref(), &url, trace_id, attempt)
        })
        .await;

        match &result {
            Ok(_) => self.circuit_breaker.record_success(operation),
            Err(failure) if failure.is_retryable() => {
                self.circuit_breaker.record_failure(operation)
            }
            // Client errors do not count against the circuit
            Err(_) => self.circuit_breaker.record_success(operation),
        }

        if let Err(failure) = &result {
            warn!(
                operation = %operation,
                trace_id = %trace_id,
                kind = %failure.kind,
                reason = %failure.reason(),
                "Upstream operation failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::credentials::StaticCredentialProvider;
    use shared_types::{ConsumerInformationIdRef, GetDataRequest, Intent, RequestStatusQuery};

    fn client(base_url: &str) -> HttpUpstreamClient {
        HttpUpstreamClient::new(
            UpstreamConfig::default().with_base_url(base_url),
            Arc::new(StaticCredentialProvider::new("key", "secret")),
        )
        .unwrap()
    }

    #[test]
    fn test_url_keeps_base_path() {
        let client = client("https://api.example.com/sandbox/");
        let request = OperationRequest::GetData(GetDataRequest {
            intent: Intent::new("PRODUCT_CODE", "CLICK_TO_PAY"),
            consumer_information: ConsumerInformationIdRef::new("c-1"),
        });
        assert_eq!(
            client.url_for(&request).unwrap().as_str(),
            "https://api.example.com/sandbox/visaIdCredential/v1/getData"
        );
    }

    #[test]
    fn test_status_url_escapes_trace_id() {
        let client = client("https://api.example.com");
        let request = OperationRequest::GetStatus(RequestStatusQuery {
            request_trace_id: "abc/def".into(),
        });
        assert_eq!(
            client.url_for(&request).unwrap().as_str(),
            "https://api.example.com/visaIdCredential/v1/requestStatus/abc%2Fdef"
        );
    }

    #[test]
    fn test_rejects_invalid_config() {
        let result = HttpUpstreamClient::new(
            UpstreamConfig::default().with_base_url("mailto:someone"),
            Arc::new(StaticCredentialProvider::new("key", "secret")),
        );
        assert!(matches!(result, Err(UpstreamError::Config(_))));
    }
}
