//! Core types for the gateway.

pub mod seller;
pub mod trust;
pub mod graph;
pub mod envelope;
pub mod delta;

pub use seller::{SellerId, SellerIdError, SellerSummary, SellerDisplay, MAX_SELLER_ID_LEN};
pub use trust::{TrustPayload, TrustResult, RiskLevel, UnknownRiskLevel, MIN_TRUST_SCORE, MAX_TRUST_SCORE};
pub use graph::{GraphPayload, GraphResult, GraphSignal, CollusionReport, COLLUSION_THRESHOLD};
pub use envelope::AggregateEnvelope;
pub use delta::{DeltaBounds, DeltaEvent, PushMessage};
