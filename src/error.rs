//! Error taxonomy for upstream calls and gateway operations.

use std::time::Duration;

use thiserror::Error;

use crate::types::SellerIdError;

/// Which upstream collaborator an error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    /// Trust computation service.
    Trust,
    /// Graph analysis service.
    Graph,
    /// Seller directory.
    Directory,
}

impl std::fmt::Display for Upstream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trust => write!(f, "trust"),
            Self::Graph => write!(f, "graph"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// Failure of a single upstream call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The call did not finish within its budget.
    ///
    /// A zero duration marks a timeout raised by the HTTP transport itself,
    /// whose budget is unknown here.
    #[error("{}", describe_timeout(.0))]
    Timeout(Duration),

    /// Connection refused, reset, DNS failure, ...
    #[error("transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("upstream returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Truncated response body.
        body: String,
    },

    /// The response body could not be parsed or failed validation.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

fn describe_timeout(budget: &Duration) -> String {
    if budget.is_zero() {
        "timed out (transport)".to_string()
    } else {
        format!("timed out after {}ms", budget.as_millis())
    }
}

impl UpstreamError {
    /// Whether the upstream reported the requested entity as unknown.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }

    /// Whether the failure is a network-level problem (timeout, unreachable).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout(_) | Self::Transport(_))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured duration on the error.
            Self::Timeout(Duration::ZERO)
        } else if err.is_decode() {
            Self::Malformed(err.to_string())
        } else if let Some(status) = err.status() {
            Self::Status {
                status: status.as_u16(),
                body: String::new(),
            }
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors surfaced to callers of the gateway.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The client-supplied seller identifier was rejected before any upstream call.
    #[error("invalid seller identifier: {0}")]
    InvalidIdentifier(#[from] SellerIdError),

    /// The required trust source failed.
    #[error("trust computation unavailable: {0}")]
    UpstreamUnavailable(#[source] UpstreamError),

    /// The seller directory could not be read.
    #[error("seller directory unavailable: {0}")]
    DirectoryUnavailable(#[source] UpstreamError),

    /// A required graph source call (community listing) failed.
    #[error("graph analysis unavailable: {0}")]
    GraphUnavailable(#[source] UpstreamError),
}

impl GatewayError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "INVALID_SELLER_ID",
            Self::UpstreamUnavailable(e) if e.is_not_found() => "SELLER_NOT_FOUND",
            Self::UpstreamUnavailable(e) if e.is_transient() => "TRUST_UNREACHABLE",
            Self::UpstreamUnavailable(_) => "TRUST_UNAVAILABLE",
            Self::DirectoryUnavailable(_) => "DIRECTORY_UNAVAILABLE",
            Self::GraphUnavailable(_) => "GRAPH_UNAVAILABLE",
        }
    }

    /// Short user-facing message.
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier(_) => "Invalid seller identifier",
            Self::UpstreamUnavailable(e) if e.is_not_found() => "No such seller",
            Self::UpstreamUnavailable(e) if e.is_transient() => {
                "Trust computation temporarily unreachable"
            }
            Self::UpstreamUnavailable(_) => "Trust computation unavailable",
            Self::DirectoryUnavailable(_) => "Failed to fetch sellers",
            Self::GraphUnavailable(_) => "Graph analysis unavailable",
        }
    }
}

/// Errors in gateway configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("invalid value for {key}: {reason}")]
    InvalidValue {
        /// Environment key.
        key: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
}

/// Result alias for gateway operations.
pub type Result<T> = std::result::Result<T, GatewayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_distinguish_trust_failures() {
        let not_found = GatewayError::UpstreamUnavailable(UpstreamError::Status {
            status: 404,
            body: "unknown".into(),
        });
        let timeout = GatewayError::UpstreamUnavailable(UpstreamError::Timeout(Duration::from_secs(5)));
        let broken = GatewayError::UpstreamUnavailable(UpstreamError::Status {
            status: 500,
            body: "boom".into(),
        });

        assert_eq!(not_found.code(), "SELLER_NOT_FOUND");
        assert_eq!(timeout.code(), "TRUST_UNREACHABLE");
        assert_eq!(broken.code(), "TRUST_UNAVAILABLE");
        assert_eq!(broken.public_message(), "Trust computation unavailable");
    }

    #[test]
    fn test_invalid_identifier_from_seller_id_error() {
        let err: GatewayError = SellerIdError::Empty.into();
        assert_eq!(err.code(), "INVALID_SELLER_ID");
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_timeout_display() {
        let err = UpstreamError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "timed out after 1500ms");
    }

    #[test]
    fn test_transport_timeout_display_has_no_duration() {
        let err = UpstreamError::Timeout(Duration::ZERO);
        assert_eq!(err.to_string(), "timed out (transport)");
        assert!(err.is_transient());

        let gateway = GatewayError::UpstreamUnavailable(err);
        assert_eq!(gateway.code(), "TRUST_UNREACHABLE");
        assert!(!gateway.to_string().contains("0ms"));
    }
}
