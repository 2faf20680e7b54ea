//! Axum routes for the gateway.

use axum::{
    extract::{Extension, Json, Path, State},
    http::StatusCode,
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{GatewayError, UpstreamError};
use crate::types::{AggregateEnvelope, CollusionReport, SellerSummary};
use crate::GATEWAY_BANNER;

use super::middleware::{metrics_middleware, request_context_middleware, CorrelationId};
use super::state::ServiceState;
use super::ws::ws_handler;

// ============================================================================
// Request/Response Types
// ============================================================================

/// Structured error response with correlation ID for tracing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message.
    pub error: String,
    /// Machine-readable error code.
    pub code: String,
    /// Correlation ID for request tracing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
    /// Additional error details (optional).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    /// Create a new error response with code and message.
    pub fn new(code: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
            correlation_id: None,
            details: None,
        }
    }

    /// Add a correlation ID to the error.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Add details to the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// A gateway error bound to the request it failed.
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// Map a gateway error to a status and body.
    pub fn from_gateway(err: &GatewayError, correlation: Option<&CorrelationId>) -> Self {
        let status = match err {
            GatewayError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            GatewayError::UpstreamUnavailable(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            GatewayError::UpstreamUnavailable(UpstreamError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::UpstreamUnavailable(UpstreamError::Transport(_)) => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamUnavailable(_)
            | GatewayError::DirectoryUnavailable(_)
            | GatewayError::GraphUnavailable(_) => StatusCode::BAD_GATEWAY,
        };

        let detail = match err {
            GatewayError::InvalidIdentifier(e) => e.to_string(),
            GatewayError::UpstreamUnavailable(e)
            | GatewayError::DirectoryUnavailable(e)
            | GatewayError::GraphUnavailable(e) => e.to_string(),
        };

        let mut body = ErrorResponse::new(err.code(), err.public_message()).with_details(detail);
        if let Some(CorrelationId(id)) = correlation {
            body = body.with_correlation_id(id.clone());
        }
        Self { status, body }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::warn!(
            code = %self.body.code,
            error = %self.body.error,
            details = ?self.body.details,
            correlation_id = ?self.body.correlation_id,
            "Request error"
        );
        (self.status, Json(self.body)).into_response()
    }
}

/// Status of one upstream dependency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamHealth {
    /// Whether the ping succeeded within budget.
    pub reachable: bool,
    /// Failure reason when unreachable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<(), UpstreamError>> for UpstreamHealth {
    fn from(result: Result<(), UpstreamError>) -> Self {
        match result {
            Ok(()) => Self {
                reachable: true,
                error: None,
            },
            Err(e) => Self {
                reachable: false,
                error: Some(e.to_string()),
            },
        }
    }
}

/// Service health response (detailed).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `healthy`, `degraded` or `unavailable`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since the service started.
    pub uptime_secs: i64,
    /// Registered broadcast subscribers.
    pub subscribers: usize,
    /// Trust source reachability.
    pub trust_source: UpstreamHealth,
    /// Graph source reachability.
    pub graph_source: UpstreamHealth,
}

/// Simple liveness response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LivenessResponse {
    /// Always `alive`.
    pub status: String,
}

/// Readiness response with dependency status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    /// Whether the service can serve lookups.
    pub ready: bool,
    /// Whether the trust source answered.
    pub trust_source: bool,
    /// Failure reason when not ready.
    pub details: Option<String>,
}

// ============================================================================
// Route Handlers
// ============================================================================

async fn root_handler() -> &'static str {
    GATEWAY_BANNER
}

/// List known sellers from the directory.
async fn list_sellers_handler(
    State(state): State<ServiceState>,
    correlation: Option<Extension<CorrelationId>>,
) -> Result<Json<Vec<SellerSummary>>, ApiError> {
    let budget = state.aggregator.timeouts().directory;
    let directory = state.aggregator.directory();

    bounded(budget, directory.list_sellers())
        .await
        .map(Json)
        .map_err(|e| {
            ApiError::from_gateway(
                &GatewayError::DirectoryUnavailable(e),
                correlation.as_ref().map(|Extension(c)| c),
            )
        })
}

/// Aggregate trust and graph data for one seller.
async fn trust_handler(
    State(state): State<ServiceState>,
    Path(seller_id): Path<String>,
    correlation: Option<Extension<CorrelationId>>,
) -> Result<Json<AggregateEnvelope>, ApiError> {
    state
        .aggregator
        .lookup(&seller_id)
        .await
        .map(Json)
        .map_err(|e| ApiError::from_gateway(&e, correlation.as_ref().map(|Extension(c)| c)))
}

/// Suspicious communities across the whole graph.
async fn collusion_handler(
    State(state): State<ServiceState>,
    correlation: Option<Extension<CorrelationId>>,
) -> Result<Json<CollusionReport>, ApiError> {
    let budget = state.aggregator.timeouts().trust;
    let graph = state.aggregator.graph_source();

    bounded(budget, graph.suspicious_communities())
        .await
        .map(Json)
        .map_err(|e| {
            ApiError::from_gateway(
                &GatewayError::GraphUnavailable(e),
                correlation.as_ref().map(|Extension(c)| c),
            )
        })
}

/// Health check endpoint (detailed).
///
/// `healthy` when both upstreams answer, `degraded` when only the trust
/// source does, `unavailable` otherwise.
async fn health_handler(State(state): State<ServiceState>) -> Json<HealthResponse> {
    let timeouts = state.aggregator.timeouts();
    let (trust, graph) = tokio::join!(
        bounded(timeouts.trust, state.aggregator.trust_source().ping()),
        bounded(timeouts.graph, state.aggregator.graph_source().ping()),
    );
    let trust_source = UpstreamHealth::from(trust);
    let graph_source = UpstreamHealth::from(graph);

    let status = match (trust_source.reachable, graph_source.reachable) {
        (true, true) => "healthy",
        (true, false) => "degraded",
        (false, _) => "unavailable",
    };

    Json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.uptime_secs(),
        subscribers: state.broadcast.subscriber_count(),
        trust_source,
        graph_source,
    })
}

/// Liveness probe endpoint.
///
/// Does NOT check dependencies.
async fn liveness_handler() -> Json<LivenessResponse> {
    Json(LivenessResponse {
        status: "alive".to_string(),
    })
}

/// Readiness probe endpoint.
///
/// Ready when the trust source, the one required dependency, answers.
async fn readiness_handler(
    State(state): State<ServiceState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let budget = state.aggregator.timeouts().trust;
    match bounded(budget, state.aggregator.trust_source().ping()).await {
        Ok(()) => Ok(Json(ReadinessResponse {
            ready: true,
            trust_source: true,
            details: None,
        })),
        Err(e) => Err((
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ReadinessResponse {
                ready: false,
                trust_source: false,
                details: Some(format!("Trust source unreachable: {}", e)),
            }),
        )),
    }
}

async fn bounded<T>(
    budget: Duration,
    call: impl std::future::Future<Output = Result<T, UpstreamError>>,
) -> Result<T, UpstreamError> {
    tokio::time::timeout(budget, call)
        .await
        .unwrap_or(Err(UpstreamError::Timeout(budget)))
}

// ============================================================================
// Router Construction
// ============================================================================

/// Create the Axum router for the gateway.
pub fn create_router(state: ServiceState) -> Router {
    Router::new()
        .route("/", get(root_handler))
        // Lookups
        .route("/api/sellers", get(list_sellers_handler))
        .route("/api/trust/:seller_id", get(trust_handler))
        .route("/api/collusion", get(collusion_handler))
        // Live deltas
        .route("/ws", get(ws_handler))
        // Health checks
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(request_context_middleware))
        .with_state(state)
}
