//! WebSocket endpoint for realtime subscribers.
//!
//! # Responsibilities
//! - Complete the upgrade handshake with the client
//! - Register the connection in the channel hub
//! - Forward hub events as text frames
//! - Send a close frame once the hub closes the subscription
//!
//! # Data Flow
//! ```text
//! ChannelHub ──── queued JSON events ────→ socket task ──── text frames ────→ Client
//! ```
//!
//! # Design Decisions
//! - Client frames other than Close are ignored
//! - Ping/pong handled transparently

use std::sync::Arc;

use axum::{
    extract::{
        ws::{close_code, CloseFrame, Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures_util::{SinkExt, StreamExt};

use crate::http::server::AppState;
use crate::realtime::ChannelHub;

/// Close reason sent when the server ends the channel.
pub const SHUTDOWN_CLOSE_REASON: &str = "server shutting down";

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state.hub))
}

async fn handle_socket(socket: WebSocket, hub: Arc<ChannelHub>) {
    let mut subscription = hub.subscribe();
    let id = subscription.id();
    let (mut sender, mut receiver) = socket.split();

    tracing::debug!(subscriber = %id, "Realtime subscriber connected");

    loop {
        tokio::select! {
            outbound = subscription.recv() => match outbound {
                Some(text) => {
                    if sender.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                None => {
                    // Closed by the hub; every queued event has been sent.
                    let frame = CloseFrame {
                        code: close_code::AWAY,
                        reason: SHUTDOWN_CLOSE_REASON.into(),
                    };
                    let _ = sender.send(Message::Close(Some(frame))).await;
                    tracing::debug!(subscriber = %id, "Realtime subscriber closed by server");
                    break;
                }
            },
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(e)) => {
                    tracing::debug!(subscriber = %id, error = %e, "Realtime socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    hub.unsubscribe(id);
    tracing::debug!(subscriber = %id, "Realtime subscriber disconnected");
}
