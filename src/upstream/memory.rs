//! In-memory upstreams for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{GraphSource, SellerDirectory, TrustSource};
use crate::error::UpstreamError;
use crate::types::{CollusionReport, GraphResult, SellerId, SellerSummary, TrustResult};

/// How a fake upstream answers.
#[derive(Debug, Clone, Default)]
pub enum Behavior {
    /// Answer from the stored data.
    #[default]
    Respond,
    /// Answer from the stored data after a delay.
    Delay(Duration),
    /// Fail every call with this error.
    Fail(UpstreamError),
    /// Never answer.
    Hang,
}

impl Behavior {
    async fn apply<T>(&self, answer: impl FnOnce() -> Result<T, UpstreamError>) -> Result<T, UpstreamError> {
        match self {
            Self::Respond => answer(),
            Self::Delay(delay) => {
                tokio::time::sleep(*delay).await;
                answer()
            }
            Self::Fail(err) => Err(err.clone()),
            Self::Hang => std::future::pending().await,
        }
    }
}

fn not_found(seller: &SellerId) -> UpstreamError {
    UpstreamError::Status {
        status: 404,
        body: format!("seller {} not found", seller),
    }
}

/// Trust source backed by a map.
///
/// Unknown sellers answer with a 404 status.
#[derive(Debug, Default)]
pub struct StaticTrustSource {
    results: HashMap<String, TrustResult>,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl StaticTrustSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result for a seller.
    pub fn add_result(&mut self, seller: &str, result: TrustResult) {
        self.results.insert(seller.to_string(), result);
    }

    /// Change how calls are answered.
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Number of `compute_trust` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TrustSource for StaticTrustSource {
    async fn compute_trust(&self, seller: &SellerId) -> Result<TrustResult, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.behavior
            .apply(|| {
                self.results
                    .get(seller.as_str())
                    .cloned()
                    .ok_or_else(|| not_found(seller))
            })
            .await
    }

    async fn ping(&self) -> Result<(), UpstreamError> {
        match &self.behavior {
            Behavior::Fail(err) => Err(err.clone()),
            _ => Ok(()),
        }
    }
}

/// Graph source backed by a map.
///
/// Unknown sellers answer with a 404 status.
#[derive(Debug, Default)]
pub struct StaticGraphSource {
    results: HashMap<String, GraphResult>,
    communities: CollusionReport,
    behavior: Behavior,
    calls: AtomicUsize,
}

impl StaticGraphSource {
    /// Create an empty source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result for a seller.
    pub fn add_result(&mut self, seller: &str, result: GraphResult) {
        self.results.insert(seller.to_string(), result);
    }

    /// Store the community listing.
    pub fn set_communities(&mut self, communities: Vec<Vec<String>>) {
        self.communities = CollusionReport {
            suspicious_communities: communities,
        };
    }

    /// Change how calls are answered.
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }

    /// Number of `graph_signals` calls received.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GraphSource for StaticGraphSource {
    async fn graph_signals(&self, seller: &SellerId) -> Result<GraphResult, UpstreamError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.behavior
            .apply(|| {
                self.results
                    .get(seller.as_str())
                    .cloned()
                    .ok_or_else(|| not_found(seller))
            })
            .await
    }

    async fn suspicious_communities(&self) -> Result<CollusionReport, UpstreamError> {
        self.behavior.apply(|| Ok(self.communities.clone())).await
    }

    async fn ping(&self) -> Result<(), UpstreamError> {
        match &self.behavior {
            Behavior::Fail(err) => Err(err.clone()),
            _ => Ok(()),
        }
    }
}

/// Seller directory backed by a list.
#[derive(Debug, Default)]
pub struct StaticDirectory {
    sellers: Vec<SellerSummary>,
    behavior: Behavior,
}

impl StaticDirectory {
    /// Create a directory listing `sellers`.
    pub fn new(sellers: Vec<SellerSummary>) -> Self {
        Self {
            sellers,
            behavior: Behavior::Respond,
        }
    }

    /// Change how calls are answered.
    pub fn with_behavior(mut self, behavior: Behavior) -> Self {
        self.behavior = behavior;
        self
    }
}

#[async_trait]
impl SellerDirectory for StaticDirectory {
    async fn list_sellers(&self) -> Result<Vec<SellerSummary>, UpstreamError> {
        self.behavior.apply(|| Ok(self.sellers.clone())).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RiskLevel;
    use std::collections::BTreeMap;

    fn trust(score: f64) -> TrustResult {
        TrustResult {
            seller_id: None,
            trust_score: score,
            risk_level: RiskLevel::from_score(score),
            volatility_index: 0.0,
            components: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_unknown_seller_is_404() {
        let source = StaticTrustSource::new();
        let err = source
            .compute_trust(&SellerId::parse("S-404").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_fail_behavior_overrides_data() {
        let mut source = StaticTrustSource::new();
        source.add_result("S-1", trust(820.0));
        let source = source.with_behavior(Behavior::Fail(UpstreamError::Transport("refused".into())));
        let err = source
            .compute_trust(&SellerId::parse("S-1").unwrap())
            .await
            .unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn test_directory_display_name() {
        let dir = StaticDirectory::new(vec![SellerSummary {
            id: "S-1".into(),
            name: "Acme".into(),
            baseline_trust_score: 700.0,
        }]);
        let found = dir.display_name(&SellerId::parse("S-1").unwrap()).await.unwrap();
        let missing = dir.display_name(&SellerId::parse("S-2").unwrap()).await.unwrap();
        assert_eq!(found.as_deref(), Some("Acme"));
        assert!(missing.is_none());
    }
}
