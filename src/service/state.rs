//! Service state management.
//!
//! Holds the aggregator and the broadcast channel shared by all handlers.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::aggregator::{Aggregator, CallTimeouts};
use crate::broadcast::BroadcastChannel;
use crate::config::GatewayConfig;
use crate::upstream::{HttpGraphClient, HttpTrustClient};

/// Shared service state.
///
/// Cheap to clone; every field is reference counted.
#[derive(Clone)]
pub struct ServiceState {
    /// Lookup orchestration over the upstreams.
    pub aggregator: Arc<Aggregator>,
    /// Live delta registry.
    pub broadcast: Arc<BroadcastChannel>,
    started_at: DateTime<Utc>,
}

impl ServiceState {
    /// Create service state from its parts.
    pub fn new(aggregator: Aggregator, broadcast: Arc<BroadcastChannel>) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
            broadcast,
            started_at: Utc::now(),
        }
    }

    /// Wire HTTP upstream clients and a broadcast channel from configuration.
    ///
    /// The trust service also serves the seller directory.
    pub fn from_config(config: &GatewayConfig, client: reqwest::Client) -> Self {
        let trust = HttpTrustClient::new(client.clone(), config.trust_service_url.clone());
        let graph = HttpGraphClient::new(client, config.graph_service_url.clone());

        let aggregator = Aggregator::new(
            Arc::new(trust.clone()),
            Arc::new(graph),
            Arc::new(trust),
            CallTimeouts::from(config),
        );
        let broadcast = Arc::new(BroadcastChannel::new(config.broadcast.clone()));

        Self::new(aggregator, broadcast)
    }

    /// When the service state was created.
    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    /// Seconds since start.
    pub fn uptime_secs(&self) -> i64 {
        (Utc::now() - self.started_at).num_seconds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_uses_configured_timeouts() {
        let mut config = GatewayConfig::default();
        config.graph_timeout = std::time::Duration::from_millis(250);

        let state = ServiceState::from_config(&config, reqwest::Client::new());
        assert_eq!(state.aggregator.timeouts().graph, config.graph_timeout);
        assert_eq!(state.broadcast.subscriber_count(), 0);
        assert!(state.uptime_secs() >= 0);
    }
}
