//! Service middleware for request context, metrics, and CORS.
//!
//! ## Metrics Exposed
//!
//! - `request` - count and latency by normalized path, method, status
//! - `lookup` - lookup outcome, graph degradation, latency
//! - `tick` - per-tick delivered/dropped/removed subscriber counts

use std::sync::OnceLock;
use std::time::Instant;

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::{info, info_span, warn, Instrument};

use crate::config::GatewayConfig;

/// Header echoing the request correlation id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation id attached to every request as an extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrelationId(pub String);

/// Attach a correlation id, run the request inside a span, and log access.
///
/// The id comes from `X-Request-Id`, then `X-Cloud-Trace-Context`, else a
/// fresh UUID.
pub async fn request_context_middleware(mut request: Request, next: Next) -> Response {
    let start = Instant::now();

    let headers = request.headers();
    let trace_id = headers
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| {
            headers
                .get("X-Cloud-Trace-Context")
                .and_then(|v| v.to_str().ok())
                .map(|s| s.split('/').next().unwrap_or(s).to_string())
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(CorrelationId(trace_id.clone()));

    let span = info_span!(
        "request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
        status = tracing::field::Empty,
        latency_ms = tracing::field::Empty,
    );

    let mut response = next.run(request).instrument(span.clone()).await;

    let latency_ms = start.elapsed().as_millis() as u64;
    let status = response.status().as_u16();
    span.record("status", status);
    span.record("latency_ms", latency_ms);

    if let Ok(value) = HeaderValue::from_str(&trace_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
    }

    info!(
        target: "trustra_gateway::access",
        trace_id = %trace_id,
        method = %method,
        path = %path,
        status = status,
        latency_ms = latency_ms,
        "request completed"
    );

    response
}

/// Metrics middleware that records request counts and latency.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().clone();
    let path = normalize_path(request.uri().path());

    let response = next.run(request).await;

    info!(
        target: "trustra_gateway::metrics",
        metric_type = "request",
        path = %path,
        method = %method,
        status = response.status().as_u16(),
        latency_ms = start.elapsed().as_millis() as u64,
        "request_metric"
    );

    response
}

/// Normalize path for metrics to avoid high cardinality.
///
/// Replaces the seller segment of lookup paths with a placeholder.
fn normalize_path(path: &str) -> String {
    static SELLER_SEGMENT: OnceLock<regex_lite::Regex> = OnceLock::new();
    let regex = SELLER_SEGMENT.get_or_init(|| {
        regex_lite::Regex::new(r"^/api/trust/[^/]+").expect("seller path pattern is a valid regex")
    });
    regex.replace(path, "/api/trust/:seller_id").to_string()
}

/// Build the CORS layer.
///
/// Any origin unless `cors_allow_origin` is configured.
pub fn cors_layer(config: &GatewayConfig) -> CorsLayer {
    let origin = match config.cors_allow_origin.as_deref().map(HeaderValue::from_str) {
        Some(Ok(origin)) => AllowOrigin::exact(origin),
        Some(Err(_)) => {
            warn!(
                origin = ?config.cors_allow_origin,
                "CORS_ALLOW_ORIGIN is not a valid header value, allowing any origin"
            );
            AllowOrigin::any()
        }
        None => AllowOrigin::any(),
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_path_replaces_seller_id() {
        assert_eq!(
            normalize_path("/api/trust/76293524-7b94-4366-963d-4299446d7904"),
            "/api/trust/:seller_id"
        );
        assert_eq!(normalize_path("/api/trust/S-1"), "/api/trust/:seller_id");
    }

    #[test]
    fn test_normalize_path_preserves_regular_path() {
        assert_eq!(normalize_path("/health/ready"), "/health/ready");
        assert_eq!(normalize_path("/api/sellers"), "/api/sellers");
    }
}
