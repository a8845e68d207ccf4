//! `WebSocket` stream of market updates at `GET /ws/ticks`.
//!
//! A new client first receives one `snapshot` frame with the full meme
//! list, then one `tick` frame per tick. Frames are JSON objects tagged
//! by `type`:
//!
//! ```json
//! { "type": "snapshot", "tick": 12, "memes": [ ... ] }
//! { "type": "tick", "tick": 13, "memes": 5, "up": 1, ... }
//! ```
//!
//! A client that falls behind the broadcast buffer skips to the newest
//! tick. Sending the text `snapshot` requests a fresh snapshot frame.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use memestock_core::Meme;
use serde::Serialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use crate::state::{AppState, TickBroadcast};

/// A frame sent to `WebSocket` clients.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsFrame {
    /// The whole market as of `tick`.
    Snapshot {
        /// Tick the snapshot was taken at.
        tick: u64,
        /// Memes in collection order.
        memes: Vec<Meme>,
    },
    /// Summary of one completed tick.
    Tick(TickBroadcast),
}

/// Upgrade to a `WebSocket` and start streaming.
pub async fn ws_ticks(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| stream_market(socket, state))
}

/// Build a snapshot frame from the store.
pub async fn snapshot_frame(state: &AppState) -> WsFrame {
    let (tick, memes) = state.store.tick_snapshot().await;
    WsFrame::Snapshot { tick, memes }
}

/// Serialize and send one frame. `false` means the client is gone.
async fn send_frame(socket: &mut WebSocket, frame: &WsFrame) -> bool {
    match serde_json::to_string(frame) {
        Ok(json) => socket.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            warn!(error = %e, "Dropping unserializable WebSocket frame");
            true
        }
    }
}

async fn stream_market(mut socket: WebSocket, state: Arc<AppState>) {
    // Subscribe before the snapshot so no tick falls between the two.
    let mut rx = state.subscribe();
    debug!(clients = state.tx.receiver_count(), "WebSocket client connected");

    if !send_frame(&mut socket, &snapshot_frame(&state).await).await {
        return;
    }

    loop {
        tokio::select! {
            received = rx.recv() => match received {
                Ok(tick) => {
                    if !send_frame(&mut socket, &WsFrame::Tick(tick)).await {
                        debug!("WebSocket send failed, dropping client");
                        return;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "WebSocket client lagged");
                }
                Err(RecvError::Closed) => return,
            },
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) if text.as_str().trim() == "snapshot" => {
                    if !send_frame(&mut socket, &snapshot_frame(&state).await).await {
                        return;
                    }
                }
                Some(Ok(Message::Ping(payload))) => {
                    if socket.send(Message::Pong(payload)).await.is_err() {
                        return;
                    }
                }
                Some(Ok(Message::Close(_)) | Err(_)) | None => {
                    debug!("WebSocket client disconnected");
                    return;
                }
                Some(Ok(_)) => {}
            },
        }
    }
}
