//! Partial-failure aggregation of the trust and graph sources.
//!
//! One lookup issues three concurrent calls:
//!
//! ```text
//!                 ┌─ TrustSource::compute_trust   (required, trust_timeout)
//! SellerId ──────┼─ GraphSource::graph_signals   (best effort, graph_timeout → Absent)
//!                 └─ SellerDirectory::display_name (best effort, directory_timeout → placeholder)
//!                                    ↓
//!                           AggregateEnvelope
//! ```
//!
//! Only a trust failure fails the lookup. Dropping the lookup future drops
//! all pending upstream calls with it.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::error::{GatewayError, Result, Upstream, UpstreamError};
use crate::metrics::record_lookup_metrics;
use crate::types::{AggregateEnvelope, GraphSignal, SellerDisplay, SellerId};
use crate::upstream::{GraphSource, SellerDirectory, TrustSource};

/// Per-call time budgets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallTimeouts {
    /// Required trust call.
    pub trust: Duration,
    /// Best-effort graph call.
    pub graph: Duration,
    /// Best-effort name resolution.
    pub directory: Duration,
}

impl Default for CallTimeouts {
    fn default() -> Self {
        let cfg = GatewayConfig::default();
        Self::from(&cfg)
    }
}

impl From<&GatewayConfig> for CallTimeouts {
    fn from(cfg: &GatewayConfig) -> Self {
        Self {
            trust: cfg.trust_timeout,
            graph: cfg.graph_timeout,
            directory: cfg.directory_timeout,
        }
    }
}

/// Merges one required and two best-effort upstream answers per lookup.
///
/// Stateless across calls: concurrent lookups never interact and identical
/// concurrent requests are not coalesced.
#[derive(Clone)]
pub struct Aggregator {
    trust: Arc<dyn TrustSource>,
    graph: Arc<dyn GraphSource>,
    directory: Arc<dyn SellerDirectory>,
    timeouts: CallTimeouts,
}

impl Aggregator {
    /// Create an aggregator over the given upstreams.
    pub fn new(
        trust: Arc<dyn TrustSource>,
        graph: Arc<dyn GraphSource>,
        directory: Arc<dyn SellerDirectory>,
        timeouts: CallTimeouts,
    ) -> Self {
        Self {
            trust,
            graph,
            directory,
            timeouts,
        }
    }

    /// Configured time budgets.
    pub fn timeouts(&self) -> CallTimeouts {
        self.timeouts
    }

    /// The trust source.
    pub fn trust_source(&self) -> &Arc<dyn TrustSource> {
        &self.trust
    }

    /// The graph source.
    pub fn graph_source(&self) -> &Arc<dyn GraphSource> {
        &self.graph
    }

    /// The seller directory.
    pub fn directory(&self) -> &Arc<dyn SellerDirectory> {
        &self.directory
    }

    /// Validate a raw identifier and look it up.
    ///
    /// Malformed identifiers are rejected before any upstream call.
    pub async fn lookup(&self, raw_id: &str) -> Result<AggregateEnvelope> {
        let seller = SellerId::parse(raw_id)?;
        self.lookup_id(&seller).await
    }

    /// Look up a validated identifier.
    pub async fn lookup_id(&self, seller: &SellerId) -> Result<AggregateEnvelope> {
        let start = Instant::now();

        let (trust, graph, name) = tokio::join!(
            with_timeout(self.timeouts.trust, self.trust.compute_trust(seller)),
            with_timeout(self.timeouts.graph, self.graph.graph_signals(seller)),
            with_timeout(self.timeouts.directory, self.directory.display_name(seller)),
        );

        let trust = match trust {
            Ok(trust) => trust,
            Err(e) => {
                warn!(
                    seller_id = %seller,
                    upstream = %Upstream::Trust,
                    error = %e,
                    "Trust source failed, rejecting lookup"
                );
                record_lookup_metrics(false, false, start.elapsed().as_millis() as u64);
                return Err(GatewayError::UpstreamUnavailable(e));
            }
        };

        let graph = match graph {
            Ok(result) => GraphSignal::Available(result),
            Err(e) => {
                warn!(
                    seller_id = %seller,
                    upstream = %Upstream::Graph,
                    error = %e,
                    "Graph source degraded, substituting empty graph data"
                );
                GraphSignal::Absent
            }
        };

        let name = name.unwrap_or_else(|e| {
            debug!(
                seller_id = %seller,
                upstream = %Upstream::Directory,
                error = %e,
                "Name resolution failed, using placeholder"
            );
            None
        });

        let envelope = AggregateEnvelope::new(SellerDisplay::resolve(seller.clone(), name), trust, graph);
        record_lookup_metrics(true, envelope.is_degraded(), start.elapsed().as_millis() as u64);
        Ok(envelope)
    }
}

/// Bound an upstream call, mapping expiry to [`UpstreamError::Timeout`].
async fn with_timeout<T, F>(budget: Duration, call: F) -> std::result::Result<T, UpstreamError>
where
    F: Future<Output = std::result::Result<T, UpstreamError>>,
{
    match tokio::time::timeout(budget, call).await {
        Ok(result) => result,
        Err(_) => Err(UpstreamError::Timeout(budget)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{GraphResult, RiskLevel, SellerSummary, TrustResult};
    use crate::upstream::{Behavior, StaticDirectory, StaticGraphSource, StaticTrustSource};
    use std::collections::BTreeMap;

    fn trust(score: f64) -> TrustResult {
        TrustResult {
            seller_id: Some("S-1".into()),
            trust_score: score,
            risk_level: RiskLevel::from_score(score),
            volatility_index: 20.0,
            components: BTreeMap::from([("behavioral".to_string(), 810.0)]),
        }
    }

    fn graph(cc: f64) -> GraphResult {
        GraphResult {
            seller_id: Some("S-1".into()),
            clustering_coefficient: cc,
            centrality: Some(3.0),
            fraud_risk: None,
        }
    }

    fn timeouts() -> CallTimeouts {
        CallTimeouts {
            trust: Duration::from_millis(500),
            graph: Duration::from_millis(50),
            directory: Duration::from_millis(50),
        }
    }

    fn aggregator(trust_src: StaticTrustSource, graph_src: StaticGraphSource, dir: StaticDirectory) -> Aggregator {
        Aggregator::new(Arc::new(trust_src), Arc::new(graph_src), Arc::new(dir), timeouts())
    }

    fn sources() -> (StaticTrustSource, StaticGraphSource) {
        let mut t = StaticTrustSource::new();
        t.add_result("S-1", trust(820.0));
        let mut g = StaticGraphSource::new();
        g.add_result("S-1", graph(0.2));
        (t, g)
    }

    #[tokio::test]
    async fn test_lookup_merges_both_sources() {
        let (t, g) = sources();
        let agg = aggregator(t, g, StaticDirectory::default());

        let envelope = agg.lookup("S-1").await.unwrap();
        assert_eq!(envelope.trust_data.trust_score, 820.0);
        assert_eq!(envelope.graph_data.as_result().unwrap().clustering_coefficient, 0.2);
        assert_eq!(envelope.seller.name, "Seller S-1");
    }

    #[tokio::test]
    async fn test_invalid_identifier_skips_upstreams() {
        let (t, g) = sources();
        let t = Arc::new(t);
        let g = Arc::new(g);
        let agg = Aggregator::new(t.clone(), g.clone(), Arc::new(StaticDirectory::default()), timeouts());

        let err = agg.lookup("  ").await.unwrap_err();
        assert!(matches!(err, GatewayError::InvalidIdentifier(_)));
        assert_eq!(t.calls(), 0);
        assert_eq!(g.calls(), 0);
    }

    #[tokio::test]
    async fn test_graph_hang_is_bounded_by_graph_timeout() {
        let (t, g) = sources();
        let agg = aggregator(t, g.with_behavior(Behavior::Hang), StaticDirectory::default());

        let start = Instant::now();
        let envelope = agg.lookup("S-1").await.unwrap();
        assert!(envelope.graph_data.is_absent());
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_trust_failure_rejects_lookup() {
        let (t, g) = sources();
        let t = t.with_behavior(Behavior::Fail(UpstreamError::Status {
            status: 500,
            body: "boom".into(),
        }));
        let agg = aggregator(t, g, StaticDirectory::default());

        let err = agg.lookup("S-1").await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable(UpstreamError::Status { status: 500, .. })));
    }

    #[tokio::test]
    async fn test_trust_timeout_rejects_lookup() {
        let (t, g) = sources();
        let agg = aggregator(t.with_behavior(Behavior::Hang), g, StaticDirectory::default());

        let err = agg.lookup("S-1").await.unwrap_err();
        assert!(matches!(err, GatewayError::UpstreamUnavailable(UpstreamError::Timeout(d)) if d == Duration::from_millis(500)));
    }

    #[tokio::test]
    async fn test_directory_name_used_when_listed() {
        let (t, g) = sources();
        let dir = StaticDirectory::new(vec![SellerSummary {
            id: "S-1".into(),
            name: "Acme Traders".into(),
            baseline_trust_score: 780.0,
        }]);
        let agg = aggregator(t, g, dir);

        let envelope = agg.lookup("S-1").await.unwrap();
        assert_eq!(envelope.seller.name, "Acme Traders");
    }

    #[tokio::test]
    async fn test_directory_failure_falls_back_to_placeholder() {
        let (t, g) = sources();
        let dir = StaticDirectory::default().with_behavior(Behavior::Hang);
        let agg = aggregator(t, g, dir);

        let envelope = agg.lookup("S-1").await.unwrap();
        assert_eq!(envelope.seller.name, "Seller S-1");
    }
}
