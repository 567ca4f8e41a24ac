// crates/server/src/routes/sessions.rs
//! REST API over live sessions.
//!
//! Everything here goes through the same callback slots as the WebSocket
//! handler — the server never touches authoritative session state directly.
//! Only live sessions are reachable; everything else is a 404 regardless of
//! whether the desktop knows the id.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/sessions", get(list_sessions))
        .route("/sessions/{id}", get(get_session_detail))
        .route("/sessions/{id}/send", post(send_to_session))
        .route("/sessions/{id}/interrupt", post(interrupt_session))
        .route("/sessions/{id}/history", get(get_history))
}

/// GET /api/sessions -- the live-filtered sessions list.
async fn list_sessions(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let sessions = state.live_session_list().await;
    let total = sessions.len();
    Json(json!({
        "sessions": sessions,
        "total": total,
    }))
}

/// GET /api/sessions/{id} -- full detail for one live session.
async fn get_session_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.live_sessions.is_live(&id).await {
        return Err(ApiError::SessionNotFound(id));
    }
    let detail = match &state.callbacks.get_session_detail {
        Some(callback) => callback(id.clone()).await,
        None => None,
    };
    match detail {
        Some(detail) => Ok(Json(json!({ "session": detail }))),
        None => Err(ApiError::SessionNotFound(id)),
    }
}

#[derive(Debug, Deserialize)]
struct SendBody {
    text: String,
}

/// POST /api/sessions/{id}/send -- forward text to the session's agent.
async fn send_to_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<SendBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.live_sessions.is_live(&id).await {
        return Err(ApiError::SessionNotFound(id));
    }
    if body.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be empty".into()));
    }
    let Some(callback) = &state.callbacks.execute_command else {
        return Err(ApiError::Unavailable("send".into()));
    };
    let accepted = callback((id, body.text)).await;
    Ok(Json(json!({ "ok": accepted })))
}

/// POST /api/sessions/{id}/interrupt -- interrupt the in-flight turn.
async fn interrupt_session(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.live_sessions.is_live(&id).await {
        return Err(ApiError::SessionNotFound(id));
    }
    let Some(callback) = &state.callbacks.interrupt else {
        return Err(ApiError::Unavailable("interrupt".into()));
    };
    let accepted = callback(id).await;
    Ok(Json(json!({ "ok": accepted })))
}

/// GET /api/sessions/{id}/history -- conversation history for one session.
async fn get_history(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !state.live_sessions.is_live(&id).await {
        return Err(ApiError::SessionNotFound(id));
    }
    let history = match &state.callbacks.get_history {
        Some(callback) => callback(id.clone()).await,
        None => None,
    };
    match history {
        Some(history) => Ok(Json(json!({ "history": history }))),
        None => Err(ApiError::SessionNotFound(id)),
    }
}
