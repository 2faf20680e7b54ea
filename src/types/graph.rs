//! Network signals from the graph source.

use serde::de::Error as _;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::trust::RiskLevel;

/// Clustering coefficient above which the graph source flags collusion.
pub const COLLUSION_THRESHOLD: f64 = 0.5;

/// Raw `/graph/{id}` response as sent by the graph source.
#[derive(Debug, Clone, Deserialize)]
pub struct GraphPayload {
    /// Echoed seller identifier.
    #[serde(default)]
    pub seller_id: Option<String>,
    /// Unchecked clustering coefficient.
    pub clustering_coefficient: f64,
    /// Degree centrality, if computed.
    #[serde(default)]
    pub centrality: Option<f64>,
    /// Risk label; unknown labels are dropped.
    #[serde(default)]
    pub fraud_risk: Option<String>,
}

/// Validated network metrics for one seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphResult {
    /// Seller identifier echoed by the graph source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
    /// How strongly the seller's buyers are connected to each other, in [0, 1].
    pub clustering_coefficient: f64,
    /// In-degree centrality.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub centrality: Option<f64>,
    /// Collusion risk label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fraud_risk: Option<RiskLevel>,
}

impl GraphResult {
    /// Validate a raw payload.
    pub fn from_payload(payload: GraphPayload) -> Result<Self, String> {
        let cc = payload.clustering_coefficient;
        if !cc.is_finite() || !(0.0..=1.0).contains(&cc) {
            return Err(format!("clustering_coefficient {} outside [0, 1]", cc));
        }
        if let Some(c) = payload.centrality {
            if !c.is_finite() {
                return Err("centrality is not finite".to_string());
            }
        }
        Ok(Self {
            seller_id: payload.seller_id,
            clustering_coefficient: cc,
            centrality: payload.centrality,
            fraud_risk: payload.fraud_risk.as_deref().and_then(|label| label.parse().ok()),
        })
    }

    /// Whether the buyer network looks collusive.
    pub fn indicates_collusion(&self) -> bool {
        self.clustering_coefficient > COLLUSION_THRESHOLD
    }
}

/// Graph result of one lookup: present, or absent because the graph source
/// was degraded.
///
/// Serializes as the bare result or as `{}` when absent.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum GraphSignal {
    /// The graph source answered with a valid payload.
    Available(GraphResult),
    /// The graph source failed, timed out, or sent a malformed payload.
    #[default]
    Absent,
}

impl GraphSignal {
    /// Borrow the result if present.
    pub fn as_result(&self) -> Option<&GraphResult> {
        match self {
            Self::Available(result) => Some(result),
            Self::Absent => None,
        }
    }

    /// Whether the graph source was degraded for this lookup.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

impl From<Option<GraphResult>> for GraphSignal {
    fn from(result: Option<GraphResult>) -> Self {
        result.map_or(Self::Absent, Self::Available)
    }
}

impl Serialize for GraphSignal {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Available(result) => result.serialize(serializer),
            Self::Absent => serializer.serialize_map(Some(0))?.end(),
        }
    }
}

impl<'de> Deserialize<'de> for GraphSignal {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        match &value {
            serde_json::Value::Null => Ok(Self::Absent),
            serde_json::Value::Object(map) if map.is_empty() => Ok(Self::Absent),
            _ => serde_json::from_value(value)
                .map(Self::Available)
                .map_err(D::Error::custom),
        }
    }
}

/// Suspicious buyer/seller communities reported by the graph source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollusionReport {
    /// Each community is a list of node identifiers.
    #[serde(default)]
    pub suspicious_communities: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_absent_serializes_as_empty_object() {
        let value = serde_json::to_value(GraphSignal::Absent).unwrap();
        assert_eq!(value, json!({}));
    }

    #[test]
    fn test_available_serializes_flat() {
        let signal = GraphSignal::Available(GraphResult {
            seller_id: None,
            clustering_coefficient: 0.25,
            centrality: Some(4.0),
            fraud_risk: Some(RiskLevel::Low),
        });
        let value = serde_json::to_value(&signal).unwrap();
        assert_eq!(value, json!({ "clustering_coefficient": 0.25, "centrality": 4.0, "fraud_risk": "Low" }));

        let back: GraphSignal = serde_json::from_value(value).unwrap();
        assert_eq!(back, signal);
    }

    #[test]
    fn test_empty_object_deserializes_as_absent() {
        let signal: GraphSignal = serde_json::from_value(json!({})).unwrap();
        assert!(signal.is_absent());
    }

    #[test]
    fn test_from_payload_rejects_out_of_range_coefficient() {
        let payload: GraphPayload =
            serde_json::from_value(json!({ "clustering_coefficient": 1.7 })).unwrap();
        assert!(GraphResult::from_payload(payload).is_err());
    }

    #[test]
    fn test_collusion_threshold() {
        let payload: GraphPayload = serde_json::from_value(json!({
            "seller_id": "S-1",
            "centrality": 12,
            "clustering_coefficient": 0.66,
            "fraud_risk": "High"
        }))
        .unwrap();
        let result = GraphResult::from_payload(payload).unwrap();
        assert!(result.indicates_collusion());
        assert_eq!(result.fraud_risk, Some(RiskLevel::High));
    }
}
