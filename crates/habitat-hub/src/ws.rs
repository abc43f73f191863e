//! `WebSocket` handler for snapshot streaming.
//!
//! Clients connect to `GET /` (or `GET /ws`) and receive one JSON text frame
//! per published tick until they disconnect. Each connection registers its
//! own queue with the [`BroadcastHub`](crate::hub::BroadcastHub) and this
//! task forwards that queue onto the socket, so a slow socket only ever
//! stalls itself.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use tracing::debug;

use crate::state::AppState;

/// Upgrade an HTTP request to a `WebSocket` connection and begin
/// streaming snapshots.
///
/// # Route
///
/// `GET /`, `GET /ws`
pub async fn ws_snapshots(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Handle the `WebSocket` lifecycle: register with the hub, forward each
/// queued frame, and unregister on the way out.
async fn handle_ws(mut socket: WebSocket, state: Arc<AppState>) {
    let mut subscription = state.hub.register();
    let client_id = subscription.id();

    loop {
        tokio::select! {
            // Relay shutting down: say goodbye properly.
            () = state.control.stopped() => {
                debug!(%client_id, "Relay stopping, closing socket");
                let _ = socket.send(Message::Close(None)).await;
                break;
            }
            // Forward the next snapshot frame.
            frame = subscription.recv() => {
                let Some(frame) = frame else {
                    debug!(%client_id, "Hub dropped client, closing socket");
                    let _ = socket.send(Message::Close(None)).await;
                    break;
                };
                if socket.send(Message::Text(frame.as_ref().into())).await.is_err() {
                    debug!(%client_id, "WebSocket client disconnected (send failed)");
                    break;
                }
            }
            // Check if the client sent a close frame or disconnected.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!(%client_id, "WebSocket client disconnected");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            debug!(%client_id, "WebSocket client disconnected (pong failed)");
                            break;
                        }
                    }
                    Some(Err(e)) => {
                        debug!(%client_id, error = %e, "WebSocket error");
                        break;
                    }
                    _ => {
                        // Clients have nothing to say; ignore text and binary frames.
                    }
                }
            }
        }
    }

    state.hub.unregister(client_id);
}
