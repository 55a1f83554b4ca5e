//! Middleware stack for the HTTP surface.
//!
//! Order (outermost first): correlation + span, request trace, timeout,
//! body size limit.

pub mod correlation;

pub use correlation::{CorrelationLayer, RequestCorrelation, CORRELATION_HEADER_NAME};

use std::time::Duration;

use axum::Router;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

/// Wrap `router` in the standard middleware stack.
pub fn apply<S>(router: Router<S>, request_timeout: Duration, max_body_bytes: usize) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router.layer(
        ServiceBuilder::new()
            .layer(CorrelationLayer::new())
            .layer(TraceLayer::new_for_http())
            .layer(TimeoutLayer::new(request_timeout))
            .map_response(|res: axum::response::Response<_>| res.map(axum::body::Body::new))
            .layer(RequestBodyLimitLayer::new(max_body_bytes)),
    )
}
