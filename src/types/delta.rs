//! Live score deltas pushed to subscribers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::seller::SellerId;

/// Inclusive bounds for generated score changes.
///
/// Always `min <= max`, including when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawBounds")]
pub struct DeltaBounds {
    min: i32,
    max: i32,
}

#[derive(Deserialize)]
struct RawBounds {
    min: i32,
    max: i32,
}

impl TryFrom<RawBounds> for DeltaBounds {
    type Error = String;

    fn try_from(raw: RawBounds) -> Result<Self, Self::Error> {
        Self::new(raw.min, raw.max)
            .ok_or_else(|| format!("delta bounds min {} exceeds max {}", raw.min, raw.max))
    }
}

impl DeltaBounds {
    /// Create bounds; `None` when `min > max`.
    pub fn new(min: i32, max: i32) -> Option<Self> {
        (min <= max).then_some(Self { min, max })
    }

    /// Lower bound (inclusive).
    pub fn min(&self) -> i32 {
        self.min
    }

    /// Upper bound (inclusive).
    pub fn max(&self) -> i32 {
        self.max
    }

    /// Whether `change` lies within the bounds.
    pub fn contains(&self, change: i32) -> bool {
        (self.min..=self.max).contains(&change)
    }
}

impl Default for DeltaBounds {
    fn default() -> Self {
        Self { min: -5, max: 5 }
    }
}

/// A relative score change for one seller.
///
/// Clients add `change` to whatever baseline they currently hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeltaEvent {
    /// Seller the change applies to.
    pub seller_id: SellerId,
    /// Signed score change.
    pub change: i32,
    /// When the tick produced this event.
    pub emitted_at: DateTime<Utc>,
}

impl DeltaEvent {
    /// Create an event stamped with the current time.
    pub fn new(seller_id: SellerId, change: i32) -> Self {
        Self {
            seller_id,
            change,
            emitted_at: Utc::now(),
        }
    }
}

/// Frames pushed over the subscription stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum PushMessage {
    /// A live score delta.
    TrustUpdate(DeltaEvent),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_reject_inverted_range() {
        assert!(DeltaBounds::new(3, -3).is_none());
        let b = DeltaBounds::new(-2, 2).unwrap();
        assert!(b.contains(-2) && b.contains(2));
        assert!(!b.contains(3));
    }

    #[test]
    fn test_deserialize_rejects_inverted_bounds() {
        let err = serde_json::from_str::<DeltaBounds>(r#"{"min":5,"max":-5}"#).unwrap_err();
        assert!(err.to_string().contains("exceeds max"));

        let ok: DeltaBounds = serde_json::from_str(r#"{"min":-1,"max":4}"#).unwrap();
        assert_eq!((ok.min(), ok.max()), (-1, 4));
    }

    #[test]
    fn test_push_message_wire_shape() {
        let event = DeltaEvent::new(SellerId::parse("S-1").unwrap(), -3);
        let value = serde_json::to_value(PushMessage::TrustUpdate(event)).unwrap();
        assert_eq!(value["event"], "trust_update");
        assert_eq!(value["sellerId"], "S-1");
        assert_eq!(value["change"], -3);
        assert!(value["emittedAt"].is_string());
    }
}
