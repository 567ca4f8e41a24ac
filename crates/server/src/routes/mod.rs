//! Route handlers for the remote-access server.

pub mod health;
pub mod pages;
pub mod sessions;

use std::sync::Arc;

use axum::Router;

use crate::state::AppState;

/// Routes that live behind the security token.
///
/// - `GET  /`                            - Dashboard page
/// - `GET  /session/{id}`                - Per-session page
/// - `GET  /api/sessions`                - List live sessions
/// - `GET  /api/sessions/{id}`           - Full session detail
/// - `POST /api/sessions/{id}/send`      - Send text to the session's agent
/// - `POST /api/sessions/{id}/interrupt` - Interrupt the in-flight turn
/// - `GET  /api/sessions/{id}/history`   - Conversation history
pub fn authenticated_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(pages::router())
        .nest("/api", sessions::router())
}
