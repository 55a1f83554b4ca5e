//! Decorates every outbound request with correlation, auth and timestamp headers.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, Duration as ChronoDuration, SecondsFormat, Utc};
use parking_lot::Mutex;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION};
use shared_types::{TraceId, CORRELATION_HEADER};
use tracing::{debug, trace};

use crate::ports::outbound::{AuthContext, CredentialError, CredentialProvider};

pub const REQUEST_TIMESTAMP_HEADER: &str = "X-Request-Timestamp";

/// Headers never written to the logs.
const SECRET_HEADERS: &[&str] = &["authorization", "x-client-token"];

/// Adds `X-Correlation-Id`, `Authorization: Basic` and `X-Request-Timestamp`.
///
/// Credentials are fetched per request and not retained. Timestamps are
/// strictly increasing across all requests decorated by one authenticator.
pub struct RequestAuthenticator {
    credentials: Arc<dyn CredentialProvider>,
    last_timestamp: Mutex<Option<DateTime<Utc>>>,
}

impl RequestAuthenticator {
    pub fn new(credentials: Arc<dyn CredentialProvider>) -> Self {
        Self {
            credentials,
            last_timestamp: Mutex::new(None),
        }
    }

    /// Decorate `request`. An `X-Correlation-Id` already present is kept.
    ///
    /// Fails without touching the network when credentials cannot be read.
    pub async fn decorate(
        &self,
        mut request: reqwest::Request,
        trace_id: &TraceId,
    ) -> Result<reqwest::Request, CredentialError> {
        let auth = self.credentials.credentials().await?;

        let headers = request.headers_mut();
        if !headers.contains_key(CORRELATION_HEADER) {
            headers.insert(
                HeaderName::from_static("x-correlation-id"),
                header_value(trace_id.as_str())?,
            );
        }
        headers.insert(AUTHORIZATION, basic_auth(&auth)?);
        headers.insert(
            HeaderName::from_static("x-request-timestamp"),
            header_value(&self.next_timestamp())?,
        );

        debug!(
            method = %request.method(),
            uri = %request.url(),
            trace_id = %trace_id,
            "Sending upstream request"
        );
        for (name, value) in request.headers() {
            if !SECRET_HEADERS.contains(&name.as_str()) {
                trace!(header = %name, value = ?value, "Upstream request header");
            }
        }

        Ok(request)
    }

    /// Current time in RFC 3339 with microseconds, bumped by one microsecond
    /// when the clock has not moved past the previous value.
    fn next_timestamp(&self) -> String {
        let mut last = self.last_timestamp.lock();
        let mut now = Utc::now();
        if let Some(prev) = *last {
            if now <= prev {
                now = prev + ChronoDuration::microseconds(1);
            }
        }
        *last = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }
}

fn basic_auth(auth: &AuthContext) -> Result<HeaderValue, CredentialError> {
    let encoded = STANDARD.encode(format!("{}:{}", auth.api_key, auth.api_secret.as_str()));
    let mut value = header_value(&format!("Basic {}", encoded))?;
    value.set_sensitive(true);
    Ok(value)
}

fn header_value(value: &str) -> Result<HeaderValue, CredentialError> {
    HeaderValue::from_str(value)
        .map_err(|_| CredentialError::Unavailable("value is not a valid header".into()))
}
