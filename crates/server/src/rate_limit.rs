// crates/server/src/rate_limit.rs
//! Per-client-IP fixed-window rate limiting.
//!
//! Mutating (POST) requests share a separate, lower threshold than reads.
//! `/health` is the single allow-listed route — it must stay reachable for
//! unauthenticated probes — and the whole limiter sits behind one master
//! `enabled` flag.

use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};

use crate::error::ErrorResponse;
use crate::state::AppState;

/// Rate-limit configuration, overridable as a single record.
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Requests allowed per window per IP.
    pub max: u32,
    pub time_window: Duration,
    /// Lower threshold for mutating (POST) endpoints.
    pub max_post: u32,
    /// Master switch. Off means no limiting anywhere.
    pub enabled: bool,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max: 120,
            time_window: Duration::from_secs(60),
            max_post: 30,
            enabled: true,
        }
    }
}

#[derive(Debug)]
struct Window {
    started: Instant,
    count: u32,
}

/// Fixed-window counters, bucketed per (IP, mutating) pair.
pub struct RateLimiter {
    config: RateLimitConfig,
    windows: Mutex<HashMap<(IpAddr, bool), Window>>,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            windows: Mutex::new(HashMap::new()),
        }
    }

    /// Record one request. `true` means allowed.
    pub fn check(&self, ip: IpAddr, mutating: bool) -> bool {
        if !self.config.enabled {
            return true;
        }
        let limit = if mutating {
            self.config.max_post
        } else {
            self.config.max
        };

        let mut windows = self.windows.lock().expect("rate limiter lock");
        let now = Instant::now();
        let window = windows.entry((ip, mutating)).or_insert(Window {
            started: now,
            count: 0,
        });
        if now.duration_since(window.started) >= self.config.time_window {
            window.started = now;
            window.count = 0;
        }
        window.count += 1;
        window.count <= limit
    }
}

/// Axum middleware applying the limiter to every route except `/health`.
pub async fn middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    // The unauthenticated health probe is the only allow-listed path.
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip())
        // Tests drive the router without a socket; treat those as loopback.
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
    let mutating = request.method() == Method::POST;

    if !state.rate_limiter.check(ip, mutating) {
        tracing::warn!(%ip, mutating, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorResponse::new("Too many requests")),
        )
            .into_response();
    }

    next.run(request).await
}
