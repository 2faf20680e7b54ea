//! TRUSTRA Gateway Service Binary
//!
//! Runs the gateway as a REST + WebSocket service:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Periodic score-delta broadcast
//! - Graceful shutdown handling
//!
//! ## Configuration
//!
//! See [`trustra_gateway::config`] for upstream URLs, timeouts and broadcast
//! settings. Logging is controlled by:
//! - `RUST_LOG`: Log level filter (default: trustra_gateway=info,tower_http=info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//!
//! ## Usage
//!
//! ```bash
//! TRUST_SERVICE_URL=http://localhost:8000 GRAPH_SERVICE_URL=http://localhost:8001 \
//!     cargo run --bin trustra_gateway_service
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use trustra_gateway::service::{cors_layer, create_router, ServiceState};
use trustra_gateway::GatewayConfig;

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing() {
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "json".to_string());

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "trustra_gateway=info,trustra_gateway_service=info,tower_http=info".into());

    if log_format == "pretty" {
        // Pretty format for local development
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_current_span(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .flatten_event(true),
            )
            .init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
        _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");
    info!(version = version, build_sha = build_sha, "Starting TRUSTRA Gateway");

    let config = GatewayConfig::from_env()?;
    info!(
        trust_service_url = %config.trust_service_url,
        graph_service_url = %config.graph_service_url,
        trust_timeout_ms = config.trust_timeout.as_millis() as u64,
        graph_timeout_ms = config.graph_timeout.as_millis() as u64,
        broadcast_interval_ms = config.broadcast.interval.as_millis() as u64,
        delta_min = config.broadcast.bounds.min(),
        delta_max = config.broadcast.bounds.max(),
        target_policy = ?config.broadcast.target,
        "Configuration loaded"
    );

    let client = reqwest::Client::builder()
        .connect_timeout(config.trust_timeout)
        .build()?;
    let state = ServiceState::from_config(&config, client);

    // The broadcast loop stops first so its subscribers' sockets close and
    // the graceful shutdown is not held open by WebSocket clients.
    let (stop_tx, mut stop_rx) = watch::channel(false);
    let broadcast = tokio::spawn(Arc::clone(&state.broadcast).run(async move {
        let _ = stop_rx.changed().await;
    }));

    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(address = %addr, version = version, "TRUSTRA Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            let _ = stop_tx.send(true);
        })
        .await?;

    broadcast.await?;

    info!("TRUSTRA Gateway shutdown complete");
    Ok(())
}
