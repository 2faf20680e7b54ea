//! WebSocket endpoint for live score deltas.
//!
//! Each connection registers one subscriber on upgrade and deregisters when
//! the socket closes. Events are written by the connection's own task, so a
//! slow socket only ever backs up its own queue. A write that does not finish
//! within [`SEND_TIMEOUT`] ends the connection.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Extension, Query, State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::broadcast::BroadcastChannel;
use crate::error::GatewayError;
use crate::types::{PushMessage, SellerId};

use super::middleware::CorrelationId;
use super::routes::ApiError;
use super::state::ServiceState;

/// Budget for writing one frame to a client.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Query parameters of the subscribe endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubscribeParams {
    /// Seller the client is currently viewing.
    pub seller: Option<String>,
}

/// Upgrade to a WebSocket and stream delta events.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<ServiceState>,
    Query(params): Query<SubscribeParams>,
    correlation: Option<Extension<CorrelationId>>,
) -> Result<Response, ApiError> {
    let interest = params
        .seller
        .as_deref()
        .map(SellerId::parse)
        .transpose()
        .map_err(|e| {
            ApiError::from_gateway(
                &GatewayError::InvalidIdentifier(e),
                correlation.as_ref().map(|Extension(c)| c),
            )
        })?;

    let channel = Arc::clone(&state.broadcast);
    Ok(ws.on_upgrade(move |socket| serve_subscriber(socket, channel, interest)))
}

async fn serve_subscriber(socket: WebSocket, channel: Arc<BroadcastChannel>, interest: Option<SellerId>) {
    let mut subscription = channel.subscribe(interest);
    let connection_id = subscription.id();
    info!(connection_id = %connection_id, "Client connected");

    let (mut sink, mut stream) = socket.split();

    loop {
        tokio::select! {
            event = subscription.recv() => {
                let Some(event) = event else { break };
                let text = match serde_json::to_string(&PushMessage::TrustUpdate(event)) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(connection_id = %connection_id, error = %e, "Failed to encode delta");
                        continue;
                    }
                };
                match tokio::time::timeout(SEND_TIMEOUT, sink.send(Message::Text(text))).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => {
                        debug!(connection_id = %connection_id, error = %e, "Delta delivery failed");
                        break;
                    }
                    Err(_) => {
                        warn!(
                            connection_id = %connection_id,
                            timeout_ms = SEND_TIMEOUT.as_millis() as u64,
                            "Delta write timed out, closing connection"
                        );
                        break;
                    }
                }
            }
            incoming = stream.next() => match incoming {
                None | Some(Ok(Message::Close(_))) => break,
                Some(Err(e)) => {
                    debug!(connection_id = %connection_id, error = %e, "Socket error");
                    break;
                }
                // Clients have nothing to say; pings are answered by the transport.
                Some(Ok(_)) => {}
            }
        }
    }

    channel.unsubscribe(connection_id);
    info!(connection_id = %connection_id, "Client disconnected");
}
