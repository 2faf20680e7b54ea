//! Structured metric events.
//!
//! Metrics are emitted as `tracing` events on the `trustra_gateway::metrics`
//! target and aggregated from logs.

use tracing::info;

/// Record the outcome of one lookup.
pub fn record_lookup_metrics(success: bool, graph_degraded: bool, latency_ms: u64) {
    let result = if success { "success" } else { "trust_unavailable" };
    info!(
        target: "trustra_gateway::metrics",
        metric_type = "lookup",
        result = result,
        graph_degraded = graph_degraded,
        latency_ms = latency_ms,
        "lookup_metric"
    );
}

/// Record the fan-out of one broadcast tick.
pub fn record_tick_metrics(delivered: usize, dropped: usize, removed: usize) {
    info!(
        target: "trustra_gateway::metrics",
        metric_type = "tick",
        delivered = delivered,
        dropped = dropped,
        removed = removed,
        "tick_metric"
    );
}

/// Record a subscriber joining or leaving.
pub fn record_subscription(event: &'static str, subscribers: usize) {
    info!(
        target: "trustra_gateway::metrics",
        metric_type = "subscription",
        event = event,
        subscribers = subscribers,
        "subscription_metric"
    );
}
