//! Upstream collaborators.
//!
//! The gateway talks to three external roles: the trust source (required),
//! the graph source (best effort), and the seller directory (name
//! resolution). Each is a trait so the aggregator can run against HTTP
//! clients in production and in-memory fakes in tests.

pub mod http;
pub mod memory;

use async_trait::async_trait;

use crate::error::UpstreamError;
use crate::types::{CollusionReport, GraphResult, SellerId, SellerSummary, TrustResult};

/// Source of trust computations.
#[async_trait]
pub trait TrustSource: Send + Sync {
    /// Compute the trust result for a seller.
    async fn compute_trust(&self, seller: &SellerId) -> Result<TrustResult, UpstreamError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), UpstreamError> {
        Ok(())
    }
}

/// Source of network/collusion signals.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Fetch network metrics for a seller.
    async fn graph_signals(&self, seller: &SellerId) -> Result<GraphResult, UpstreamError>;

    /// List suspicious communities across the whole graph.
    async fn suspicious_communities(&self) -> Result<CollusionReport, UpstreamError>;

    /// Cheap reachability check.
    async fn ping(&self) -> Result<(), UpstreamError> {
        Ok(())
    }
}

/// Directory of known sellers.
#[async_trait]
pub trait SellerDirectory: Send + Sync {
    /// List known sellers.
    async fn list_sellers(&self) -> Result<Vec<SellerSummary>, UpstreamError>;

    /// Resolve a display name; `Ok(None)` when the seller is not listed.
    async fn display_name(&self, seller: &SellerId) -> Result<Option<String>, UpstreamError> {
        Ok(self
            .list_sellers()
            .await?
            .into_iter()
            .find(|s| s.id == seller.as_str())
            .map(|s| s.name))
    }
}

pub use http::{HttpGraphClient, HttpTrustClient};
pub use memory::{StaticDirectory, StaticGraphSource, StaticTrustSource, Behavior};
