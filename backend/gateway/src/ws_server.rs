//! WebSocket entrypoint and connection handler.
//!
//! Upgrades HTTP to WS, binds the socket to a `RelaySession`, and releases
//! the session's presence entry when the connection ends.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{sink::SinkExt, stream::StreamExt};
use tracing::{debug, info, warn};

use crate::presence::ConnectionHandle;
use crate::server::GatewayState;
use crate::session::RelaySession;

/// Handler for `GET /ws`.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<GatewayState>,
) -> impl IntoResponse {
    ws.max_message_size(state.max_message_bytes)
        .on_upgrade(move |socket| handle_connection(socket, state))
}

async fn handle_connection(socket: WebSocket, state: GatewayState) {
    let (mut sender, mut receiver) = socket.split();
    let (handle, mut outbound) = ConnectionHandle::channel();
    let connection_id = handle.id();
    let mut session = RelaySession::new(state.registry.clone(), handle);

    info!(%connection_id, "WebSocket connection opened");

    // Drain this connection's outbound queue into the socket.
    let mut send_task = tokio::spawn(async move {
        while let Some(event) = outbound.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    warn!(%connection_id, error = %e, "Failed to encode outbound event");
                    continue;
                }
            };
            if sender.send(Message::Text(json)).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            _ = &mut send_task => {
                debug!(%connection_id, "Writer stopped");
                break;
            }
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    session.handle_text(&text).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {} // Binary, ping and pong carry no relay events.
                Some(Err(e)) => {
                    // Includes frames over the configured size limit.
                    warn!(%connection_id, error = %e, "WebSocket read failed, closing");
                    break;
                }
            }
        }
    }

    session.close().await;
    send_task.abort();

    info!(%connection_id, "WebSocket connection closed");
}
