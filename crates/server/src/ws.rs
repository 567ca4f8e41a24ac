// crates/server/src/ws.rs
//! WebSocket endpoint: one connection per remote viewer.
//!
//! On connect the client is hydrated with the current live-session list and
//! any in-flight auto-run snapshots, so a viewer joining mid-run starts from
//! current state instead of missing history. After that it receives
//! broadcast envelopes and may send routed commands (see `handler.rs`).

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::broadcast::BroadcastMessage;
use crate::handler;
use crate::state::{AppState, CLIENT_QUEUE_CAPACITY};

#[derive(Debug, Deserialize)]
pub struct WsQuery {
    /// Initial subscription scope; omitted means "all sessions".
    #[serde(rename = "sessionId")]
    session_id: Option<String>,
}

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<WsQuery>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.session_id))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>, scope: Option<String>) {
    let (mut sink, mut stream) = socket.split();

    let (tx, mut rx) = mpsc::channel::<String>(CLIENT_QUEUE_CAPACITY);
    let client_id = state.add_client(scope, tx).await;

    // Hydrate: current sessions list, then every active auto-run snapshot.
    let sessions = state.live_session_list().await;
    if let Ok(payload) = serde_json::to_string(&BroadcastMessage::SessionsList { sessions }) {
        state.send_to_client(client_id, payload).await;
    }
    let snapshots: Vec<_> = {
        let auto_run = state.auto_run.read().await;
        auto_run
            .iter()
            .map(|(session_id, run_state)| (session_id.clone(), run_state.clone()))
            .collect()
    };
    for (session_id, run_state) in snapshots {
        if let Ok(payload) = serde_json::to_string(&BroadcastMessage::AutoRunState {
            session_id,
            state: run_state,
        }) {
            state.send_to_client(client_id, payload).await;
        }
    }

    // Forward queued broadcast payloads to the socket.
    let forward_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if sink.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // Route inbound frames until the client goes away.
    while let Some(Ok(message)) = stream.next().await {
        match message {
            Message::Text(text) => {
                let reply = handler::handle_client_message(&state, client_id, &text).await;
                state.send_to_client(client_id, reply).await;
            }
            Message::Ping(_) => {
                // Pong is handled automatically by axum.
            }
            Message::Close(_) => break,
            _ => {}
        }
    }

    // Cleanup: out of the broadcast target set immediately, no grace period.
    state.remove_client(client_id).await;
    forward_task.abort();
    debug!(client_id, "websocket closed");
}
