//! Trust computation results.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Lowest score the trust source may report.
pub const MIN_TRUST_SCORE: f64 = 0.0;

/// Highest score the trust source may report.
pub const MAX_TRUST_SCORE: f64 = 1000.0;

/// Scores below this are high risk.
const HIGH_RISK_BELOW: f64 = 500.0;

/// Scores below this (and at or above [`HIGH_RISK_BELOW`]) are medium risk.
const MEDIUM_RISK_BELOW: f64 = 750.0;

/// Categorical risk level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    /// Score at or above 750.
    Low,
    /// Score in [500, 750).
    Medium,
    /// Score below 500.
    High,
}

impl RiskLevel {
    /// Classify a score with the trust source's thresholds.
    pub fn from_score(score: f64) -> Self {
        if score < HIGH_RISK_BELOW {
            Self::High
        } else if score < MEDIUM_RISK_BELOW {
            Self::Medium
        } else {
            Self::Low
        }
    }
}

/// A risk label outside `Low`, `Medium`, `High`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown risk level '{0}'")]
pub struct UnknownRiskLevel(pub String);

impl FromStr for RiskLevel {
    type Err = UnknownRiskLevel;

    /// Case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            _ => Err(UnknownRiskLevel(s.to_string())),
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Raw `/compute-trust` response as sent by the trust source.
///
/// Kept separate from [`TrustResult`] so range checks happen once, at the
/// boundary.
#[derive(Debug, Clone, Deserialize)]
pub struct TrustPayload {
    /// Echoed seller identifier.
    #[serde(default)]
    pub seller_id: Option<String>,
    /// Final trust score.
    pub trust_score: f64,
    /// Risk level label; derived from the score when absent or unknown.
    #[serde(default)]
    pub risk_level: Option<String>,
    /// Volatility of the score history.
    #[serde(default)]
    pub volatility_index: f64,
    /// Named sub-component scores.
    #[serde(default)]
    pub components: BTreeMap<String, f64>,
}

/// Validated trust result for one seller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustResult {
    /// Seller identifier echoed by the trust source, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<String>,
    /// Score in [0, 1000].
    pub trust_score: f64,
    /// Categorical risk level.
    pub risk_level: RiskLevel,
    /// Volatility of the score history.
    pub volatility_index: f64,
    /// Named sub-component scores (`behavioral`, `authenticity`, ...).
    pub components: BTreeMap<String, f64>,
}

impl TrustResult {
    /// Validate a raw payload.
    ///
    /// Returns a human-readable reason on rejection.
    pub fn from_payload(payload: TrustPayload) -> Result<Self, String> {
        let score = payload.trust_score;
        if !score.is_finite() || !(MIN_TRUST_SCORE..=MAX_TRUST_SCORE).contains(&score) {
            return Err(format!(
                "trust_score {} outside [{}, {}]",
                score, MIN_TRUST_SCORE, MAX_TRUST_SCORE
            ));
        }
        if !payload.volatility_index.is_finite() {
            return Err("volatility_index is not finite".to_string());
        }
        if let Some((name, _)) = payload.components.iter().find(|(_, v)| !v.is_finite()) {
            return Err(format!("component '{}' is not finite", name));
        }

        let risk_level = payload
            .risk_level
            .as_deref()
            .and_then(|label| label.parse().ok())
            .unwrap_or_else(|| RiskLevel::from_score(score));

        Ok(Self {
            seller_id: payload.seller_id,
            trust_score: score,
            risk_level,
            volatility_index: payload.volatility_index,
            components: payload.components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> TrustPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_risk_level_thresholds() {
        assert_eq!(RiskLevel::from_score(0.0), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(499.99), RiskLevel::High);
        assert_eq!(RiskLevel::from_score(500.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(749.0), RiskLevel::Medium);
        assert_eq!(RiskLevel::from_score(750.0), RiskLevel::Low);
    }

    #[test]
    fn test_risk_level_parses_case_insensitively() {
        assert_eq!("low".parse::<RiskLevel>(), Ok(RiskLevel::Low));
        assert_eq!(" MEDIUM ".parse::<RiskLevel>(), Ok(RiskLevel::Medium));
        assert_eq!("High".parse::<RiskLevel>(), Ok(RiskLevel::High));
        assert_eq!(
            "severe".parse::<RiskLevel>(),
            Err(UnknownRiskLevel("severe".to_string()))
        );
    }

    #[test]
    fn test_from_payload_keeps_reported_risk_level() {
        let result = TrustResult::from_payload(payload(json!({
            "seller_id": "S-1",
            "trust_score": 820.0,
            "risk_level": "Low",
            "volatility_index": 20.0,
            "components": { "behavioral": 810.5, "authenticity": 900.0 }
        })))
        .unwrap();

        assert_eq!(result.risk_level, RiskLevel::Low);
        assert_eq!(result.components["behavioral"], 810.5);
        assert_eq!(result.seller_id.as_deref(), Some("S-1"));
    }

    #[test]
    fn test_from_payload_derives_missing_risk_level() {
        let result = TrustResult::from_payload(payload(json!({
            "trust_score": 420.0,
            "risk_level": "catastrophic"
        })))
        .unwrap();
        assert_eq!(result.risk_level, RiskLevel::High);
        assert!(result.components.is_empty());
    }

    #[test]
    fn test_from_payload_rejects_out_of_range_score() {
        assert!(TrustResult::from_payload(payload(json!({ "trust_score": 1000.5 }))).is_err());
        assert!(TrustResult::from_payload(payload(json!({ "trust_score": -1.0 }))).is_err());
    }

    #[test]
    fn test_serialized_shape_matches_trust_source() {
        let result = TrustResult::from_payload(payload(json!({
            "trust_score": 820.0,
            "risk_level": "low"
        })))
        .unwrap();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value["trust_score"], 820.0);
        assert_eq!(value["risk_level"], "Low");
        assert!(value.get("seller_id").is_none());
    }
}
