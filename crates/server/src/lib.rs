// crates/server/src/lib.rs
//! Remote-access server for agent-deck.
//!
//! Owns the token-gated HTTP/WebSocket surface that mirrors live session
//! state to remote browser clients. The desktop side wires the callback
//! slots in [`SessionCallbacks`] and calls the `broadcast_*` /
//! `set_session_*` operations on [`AppState`]; this crate never touches
//! authoritative session state directly.

pub mod broadcast;
pub mod error;
pub mod handler;
pub mod live;
pub mod rate_limit;
pub mod routes;
pub mod state;
pub mod ws;

pub use broadcast::BroadcastMessage;
pub use error::{ApiError, ErrorResponse};
pub use handler::SessionCallbacks;
pub use rate_limit::RateLimitConfig;
pub use state::{AppState, ServerConfig};

use std::sync::Arc;

use axum::{routing::get, Router};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the axum application.
///
/// Every route except `/health` is nested under the per-process security
/// token, so a request without the right path prefix simply falls through to
/// the default 404 — nothing is revealed about what the server hosts.
pub fn create_app(state: Arc<AppState>) -> Router {
    let token = state.security_token.clone();

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(routes::health::router())
        .nest(
            &format!("/{token}"),
            routes::authenticated_routes().route("/ws", get(ws::ws_handler)),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            rate_limit::middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ============================================================================
// Integration Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    fn test_state() -> Arc<AppState> {
        AppState::new(ServerConfig::default())
    }

    /// Helper to make a request to the app.
    async fn request(
        app: Router,
        method: &str,
        uri: &str,
        body: Option<serde_json::Value>,
    ) -> (StatusCode, String) {
        let mut builder = Request::builder().method(method).uri(uri);

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_string(&json).unwrap())
        } else {
            Body::empty()
        };

        let response = app.oneshot(builder.body(body).unwrap()).await.unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn test_health_is_unauthenticated() {
        let app = create_app(test_state());
        let (status, body) = request(app, "GET", "/health", None).await;

        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["status"], "ok");
        assert!(json["version"].is_string());
        assert!(json["uptime_secs"].is_number());
    }

    #[tokio::test]
    async fn test_routes_without_token_are_not_found() {
        let app = create_app(test_state());
        for uri in ["/", "/api/sessions", "/ws", "/session/abc"] {
            let (status, _) = request(app.clone(), "GET", uri, None).await;
            assert_eq!(status, StatusCode::NOT_FOUND, "expected 404 for {uri}");
        }
    }

    #[tokio::test]
    async fn test_wrong_token_is_plain_not_found() {
        let app = create_app(test_state());
        let (status, body) = request(
            app,
            "GET",
            "/00000000000000000000000000000000/api/sessions",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        // No redirect, no hint about valid paths.
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_token_gated_sessions_list() {
        let state = test_state();
        let token = state.security_token.clone();
        let app = create_app(state);

        let (status, body) = request(app, "GET", &format!("/{token}/api/sessions"), None).await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["total"], 0);
    }

    #[tokio::test]
    async fn test_dashboard_serves_html() {
        let state = test_state();
        let token = state.security_token.clone();
        let app = create_app(state);

        let (status, body) = request(app, "GET", &format!("/{token}/"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("<!doctype html>"));
    }

    #[tokio::test]
    async fn test_send_to_unknown_session_is_404() {
        let state = test_state();
        let token = state.security_token.clone();
        let app = create_app(state);

        let (status, body) = request(
            app,
            "POST",
            &format!("/{token}/api/sessions/nope/send"),
            Some(serde_json::json!({ "text": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert!(json.get("error").is_some());
    }

    #[tokio::test]
    async fn test_send_without_callback_is_unavailable() {
        let state = test_state();
        let token = state.security_token.clone();
        state.live_sessions.set_live("s1", None).await;
        let app = create_app(state);

        let (status, _) = request(
            app,
            "POST",
            &format!("/{token}/api/sessions/s1/send"),
            Some(serde_json::json!({ "text": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_rate_limit_rejects_after_max() {
        let state = AppState::new(ServerConfig {
            port: 0,
            rate_limit: RateLimitConfig {
                max: 2,
                time_window: std::time::Duration::from_secs(60),
                max_post: 1,
                enabled: true,
            },
        });
        let token = state.security_token.clone();
        let app = create_app(state);
        let uri = format!("/{token}/api/sessions");

        let (first, _) = request(app.clone(), "GET", &uri, None).await;
        let (second, _) = request(app.clone(), "GET", &uri, None).await;
        let (third, _) = request(app.clone(), "GET", &uri, None).await;
        assert_eq!(first, StatusCode::OK);
        assert_eq!(second, StatusCode::OK);
        assert_eq!(third, StatusCode::TOO_MANY_REQUESTS);

        // Health bypasses the limiter entirely.
        let (health, _) = request(app, "GET", "/health", None).await;
        assert_eq!(health, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_post_threshold_is_lower() {
        let state = AppState::new(ServerConfig {
            port: 0,
            rate_limit: RateLimitConfig {
                max: 100,
                time_window: std::time::Duration::from_secs(60),
                max_post: 1,
                enabled: true,
            },
        });
        let token = state.security_token.clone();
        state.live_sessions.set_live("s1", None).await;
        let app = create_app(state);
        let uri = format!("/{token}/api/sessions/s1/interrupt");

        let (first, _) = request(app.clone(), "POST", &uri, None).await;
        let (second, _) = request(app.clone(), "POST", &uri, None).await;
        // First POST passes the limiter (503: no callback wired); second is
        // cut off by the lower mutating threshold.
        assert_eq!(first, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(second, StatusCode::TOO_MANY_REQUESTS);
    }
}
