// crates/server/src/main.rs
//! agent-deck server binary.
//!
//! Generates a fresh security token, binds the HTTP/WS listener, and prints
//! the tokenized URL. Runs until interrupted; on shutdown every live session
//! is force-offlined so remote viewers see a clean disconnect.

use std::net::SocketAddr;

use anyhow::Result;
use tracing_subscriber::EnvFilter;

use agent_deck_server::{create_app, AppState, RateLimitConfig, ServerConfig};

/// Get the server port from environment or use the config default.
fn get_port(default: u16) -> u16 {
    std::env::var("AGENT_DECK_PORT")
        .ok()
        .or_else(|| std::env::var("PORT").ok())
        .and_then(|p| p.parse().ok())
        .unwrap_or(default)
}

/// `AGENT_DECK_RATE_LIMIT=off` disables the limiter (local debugging).
fn rate_limit_from_env() -> RateLimitConfig {
    let mut config = RateLimitConfig::default();
    if let Ok(value) = std::env::var("AGENT_DECK_RATE_LIMIT") {
        if matches!(value.as_str(), "off" | "0" | "false") {
            config.enabled = false;
        }
    }
    config
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to install ctrl-c handler");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .compact()
        .init();

    let mut config = ServerConfig::default();
    config.port = get_port(config.port);
    config.rate_limit = rate_limit_from_env();
    let port = config.port;

    let state = AppState::new(config);
    let token = state.security_token.clone();
    let app = create_app(state.clone());

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    eprintln!("\n\u{1f4e1} agent-deck v{}\n", env!("CARGO_PKG_VERSION"));
    eprintln!("  \u{2192} http://localhost:{port}/{token}\n");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    // All live sessions are force-offlined on stop.
    state.offline_all().await;
    tracing::info!("server stopped");

    Ok(())
}
