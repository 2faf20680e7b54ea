//! Seller identity types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// Maximum accepted length of a seller identifier.
pub const MAX_SELLER_ID_LEN: usize = 128;

fn seller_id_pattern() -> &'static regex_lite::Regex {
    static PATTERN: OnceLock<regex_lite::Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        regex_lite::Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_.:\-]*$")
            .expect("seller id pattern is a valid regex")
    })
}

/// Reason a client-supplied identifier was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SellerIdError {
    /// Empty or whitespace-only identifier.
    #[error("seller identifier is empty")]
    Empty,
    /// Longer than [`MAX_SELLER_ID_LEN`].
    #[error("seller identifier exceeds {} characters", MAX_SELLER_ID_LEN)]
    TooLong,
    /// Contains characters outside `[A-Za-z0-9_.:-]` or starts with a separator.
    #[error("seller identifier contains invalid characters")]
    InvalidCharacters,
}

/// Opaque seller identifier supplied by a client.
///
/// Construction validates shape only; whether the seller exists is decided
/// by the trust source.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SellerId(String);

impl SellerId {
    /// Validate and wrap an identifier.
    pub fn parse(raw: &str) -> Result<Self, SellerIdError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(SellerIdError::Empty);
        }
        if trimmed.chars().count() > MAX_SELLER_ID_LEN {
            return Err(SellerIdError::TooLong);
        }
        if !seller_id_pattern().is_match(trimmed) {
            return Err(SellerIdError::InvalidCharacters);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display name used when the directory has no entry for this seller.
    pub fn placeholder_name(&self) -> String {
        format!("Seller {}", self.0)
    }
}

impl fmt::Display for SellerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SellerId {
    type Error = SellerIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<SellerId> for String {
    fn from(id: SellerId) -> Self {
        id.0
    }
}

/// Entry of the seller directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerSummary {
    /// Seller identifier as known to the directory.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Score the seller started from before any live adjustment.
    #[serde(default)]
    pub baseline_trust_score: f64,
}

/// Seller display record carried in the aggregate envelope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerDisplay {
    /// Seller identifier.
    pub id: SellerId,
    /// Display name; never empty.
    pub name: String,
}

impl SellerDisplay {
    /// Build a display record, falling back to the placeholder name.
    pub fn resolve(id: SellerId, name: Option<String>) -> Self {
        let name = name
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| id.placeholder_name());
        Self { id, name }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_accepts_uuid_and_short_ids() {
        assert!(SellerId::parse("76293524-7b94-4366-963d-4299446d7904").is_ok());
        assert_eq!(SellerId::parse("S-1").unwrap().as_str(), "S-1");
    }

    #[test]
    fn test_parse_trims_whitespace() {
        assert_eq!(SellerId::parse("  S-1 ").unwrap().as_str(), "S-1");
    }

    #[test]
    fn test_parse_rejects_empty() {
        assert_eq!(SellerId::parse(""), Err(SellerIdError::Empty));
        assert_eq!(SellerId::parse("   "), Err(SellerIdError::Empty));
    }

    #[test]
    fn test_parse_rejects_bad_shape() {
        assert_eq!(SellerId::parse("../etc"), Err(SellerIdError::InvalidCharacters));
        assert_eq!(SellerId::parse("a b"), Err(SellerIdError::InvalidCharacters));
        assert_eq!(SellerId::parse("id?x=1"), Err(SellerIdError::InvalidCharacters));
        let long = "a".repeat(MAX_SELLER_ID_LEN + 1);
        assert_eq!(SellerId::parse(&long), Err(SellerIdError::TooLong));
    }

    #[test]
    fn test_display_falls_back_to_placeholder() {
        let id = SellerId::parse("S-9").unwrap();
        assert_eq!(SellerDisplay::resolve(id.clone(), None).name, "Seller S-9");
        assert_eq!(SellerDisplay::resolve(id.clone(), Some("  ".into())).name, "Seller S-9");
        assert_eq!(SellerDisplay::resolve(id, Some("Acme".into())).name, "Acme");
    }

    #[test]
    fn test_seller_id_deserialize_validates() {
        let ok: Result<SellerId, _> = serde_json::from_str("\"S-1\"");
        assert!(ok.is_ok());
        let bad: Result<SellerId, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }
}
