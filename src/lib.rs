//! # trustra-gateway
//!
//! API gateway for the TRUSTRA seller trust dashboard.
//!
//! The gateway answers one question per request:
//!
//! > What is this seller's trust standing right now, and does their buyer
//! > network look collusive?
//!
//! ## Core Contract
//!
//! 1. A lookup calls the trust source (required) and the graph source (best
//!    effort) concurrently and merges them into one [`AggregateEnvelope`]
//! 2. A trust failure fails the lookup; a graph failure degrades to `{}`
//! 3. Connected clients receive periodic score deltas from a single
//!    [`BroadcastChannel`]
//!
//! ## Architecture
//!
//! ```text
//! GET /api/trust/:id → Aggregator ─┬─ TrustSource   (ML service)
//!                                  ├─ GraphSource   (graph service)
//!                                  └─ SellerDirectory
//!
//! GET /ws → BroadcastChannel ← tick every interval → DeltaEvent to all subscribers
//! ```
//!
//! ## Ordering
//!
//! - No ordering between lookup responses and deltas
//! - Deltas are relative; clients apply them to whatever score they hold

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod types;
pub mod error;
pub mod config;
pub mod metrics;
pub mod upstream;
pub mod aggregator;
pub mod broadcast;

#[cfg(feature = "service")]
pub mod service;

// Re-exports
pub use types::{
    SellerId, SellerIdError, SellerSummary, SellerDisplay,
    TrustResult, RiskLevel, GraphResult, GraphSignal, CollusionReport,
    AggregateEnvelope, DeltaBounds, DeltaEvent, PushMessage,
};
pub use error::{GatewayError, UpstreamError, ConfigError, Upstream};
pub use config::{GatewayConfig, BroadcastConfig, DEMO_SELLER_ID};
pub use upstream::{
    TrustSource, GraphSource, SellerDirectory,
    HttpTrustClient, HttpGraphClient,
    StaticTrustSource, StaticGraphSource, StaticDirectory, Behavior,
};
pub use aggregator::{Aggregator, CallTimeouts};
pub use broadcast::{
    BroadcastChannel, Subscription, ConnectionId, TickReport,
    TargetPolicy, DeltaGenerator,
};

// Service re-exports (when service feature is enabled)
#[cfg(feature = "service")]
pub use service::{create_router, ServiceState};

/// Plain-text banner served at `/`.
pub const GATEWAY_BANNER: &str = "TRUSTRA API Gateway Running";
