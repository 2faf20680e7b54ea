//! The aggregate lookup response.

use serde::{Deserialize, Serialize};

use super::graph::GraphSignal;
use super::seller::SellerDisplay;
use super::trust::TrustResult;

/// Merged answer of one lookup.
///
/// Only ever built after the trust source succeeded; the graph part may be
/// absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregateEnvelope {
    /// Seller display record.
    pub seller: SellerDisplay,
    /// Required trust computation.
    pub trust_data: TrustResult,
    /// Best-effort network signals (`{}` when absent).
    #[serde(default)]
    pub graph_data: GraphSignal,
}

impl AggregateEnvelope {
    /// Compose an envelope.
    pub fn new(seller: SellerDisplay, trust_data: TrustResult, graph_data: GraphSignal) -> Self {
        Self {
            seller,
            trust_data,
            graph_data,
        }
    }

    /// Whether the graph source was degraded for this lookup.
    pub fn is_degraded(&self) -> bool {
        self.graph_data.is_absent()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RiskLevel, SellerId};
    use serde_json::json;
    use std::collections::BTreeMap;

    #[test]
    fn test_envelope_wire_shape() {
        let envelope = AggregateEnvelope::new(
            SellerDisplay::resolve(SellerId::parse("S-1").unwrap(), None),
            TrustResult {
                seller_id: Some("S-1".into()),
                trust_score: 820.0,
                risk_level: RiskLevel::Low,
                volatility_index: 20.0,
                components: BTreeMap::from([("behavioral".to_string(), 800.0)]),
            },
            GraphSignal::Absent,
        );

        let value = serde_json::to_value(&envelope).unwrap();
        assert_eq!(value["seller"], json!({ "id": "S-1", "name": "Seller S-1" }));
        assert_eq!(value["trustData"]["trust_score"], 820.0);
        assert_eq!(value["trustData"]["components"]["behavioral"], 800.0);
        assert_eq!(value["graphData"], json!({}));
        assert!(envelope.is_degraded());
    }
}
