//! Gateway REST and WebSocket service.
//!
//! ## Endpoints
//!
//! - `GET /` - Banner
//! - `GET /api/sellers` - Seller directory
//! - `GET /api/trust/:seller_id` - Aggregate trust + graph lookup
//! - `GET /api/collusion` - Suspicious communities from the graph source
//! - `GET /ws` - Live score deltas (WebSocket, optional `?seller=`)
//! - `GET /health` - Detailed service health check
//! - `GET /health/live` - Liveness probe
//! - `GET /health/ready` - Readiness probe

pub mod middleware;
pub mod routes;
pub mod state;
pub mod ws;

pub use middleware::{cors_layer, metrics_middleware, request_context_middleware, CorrelationId};
pub use routes::{create_router, ApiError, ErrorResponse};
pub use state::ServiceState;
