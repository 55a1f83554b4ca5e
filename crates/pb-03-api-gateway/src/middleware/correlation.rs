//! Correlation middleware.
//!
//! Resolves the request's correlation id (the inbound `X-Correlation-Id`
//! header, or a fresh one), stores it in the request extensions, runs the
//! request inside an `api_request` span and echoes the id on the response.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum::http::{HeaderName, HeaderValue, Request, Response};
use shared_types::CorrelationId;
use std::convert::Infallible;
use std::task::{Context, Poll};
use tower::{Layer, Service};
use tracing::{info_span, Instrument, Span};

pub const CORRELATION_HEADER_NAME: HeaderName = HeaderName::from_static("x-correlation-id");

/// Correlation id resolved for the current request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCorrelation(pub CorrelationId);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for RequestCorrelation {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<RequestCorrelation>()
            .cloned()
            .unwrap_or_else(|| RequestCorrelation(resolve(parts.headers.get(&CORRELATION_HEADER_NAME)))))
    }
}

fn resolve(header: Option<&HeaderValue>) -> CorrelationId {
    header
        .and_then(|v| v.to_str().ok())
        .and_then(CorrelationId::parse)
        .unwrap_or_default()
}

#[derive(Clone, Default)]
pub struct CorrelationLayer;

impl CorrelationLayer {
    pub fn new() -> Self {
        Self
    }
}

impl<S> Layer<S> for CorrelationLayer {
    type Service = CorrelationService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        CorrelationService { inner }
    }
}

#[derive(Clone)]
pub struct CorrelationService<S> {
    inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for CorrelationService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>> + Clone + Send + 'static,
    S::Future: Send,
    ReqBody: Send + 'static,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut req: Request<ReqBody>) -> Self::Future {
        let mut inner = self.inner.clone();

        let correlation_id = resolve(req.headers().get(&CORRELATION_HEADER_NAME));
        req.extensions_mut()
            .insert(RequestCorrelation(correlation_id.clone()));

        let span = info_span!(
            "api_request",
            http.method = %req.method(),
            http.target = %req.uri().path(),
            correlation_id = %correlation_id,
            http.status = tracing::field::Empty,
        );

        Box::pin(
            async move {
                let mut response = inner.call(req).await?;
                Span::current().record("http.status", response.status().as_u16());
                if let Ok(value) = HeaderValue::from_str(correlation_id.as_str()) {
                    response
                        .headers_mut()
                        .entry(CORRELATION_HEADER_NAME)
                        .or_insert(value);
                }
                Ok(response)
            }
            .instrument(span),
        )
    }
}
