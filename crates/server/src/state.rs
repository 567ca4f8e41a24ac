// crates/server/src/state.rs
//! Application state for the remote-access server.
//!
//! The server exclusively owns the connected-client map and the
//! live-session/auto-run maps. External code mutates session state only
//! through the callback slots in [`SessionCallbacks`].

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;

use agent_deck_types::AutoRunState;

use crate::handler::SessionCallbacks;
use crate::live::LiveSessionRegistry;
use crate::rate_limit::{RateLimitConfig, RateLimiter};

/// Outbound queue depth per client. A client that falls this many messages
/// behind is disconnected rather than allowed to stall the fan-out loop.
pub const CLIENT_QUEUE_CAPACITY: usize = 256;

/// Server configuration, overridable as a single record.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub rate_limit: RateLimitConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 47895,
            rate_limit: RateLimitConfig::default(),
        }
    }
}

/// One accepted WebSocket connection.
pub struct WebClient {
    pub id: u64,
    /// `None` subscribes to everything; `Some(id)` only to that session's
    /// scoped broadcasts (plus global ones).
    pub session_scope: Option<String>,
    tx: mpsc::Sender<String>,
    pub connected_at: Instant,
}

impl WebClient {
    pub fn new(id: u64, session_scope: Option<String>, tx: mpsc::Sender<String>) -> Self {
        Self {
            id,
            session_scope,
            tx,
            connected_at: Instant::now(),
        }
    }

    /// Whether a broadcast with the given scope should reach this client.
    pub fn in_scope(&self, scope: Option<&str>) -> bool {
        match (scope, self.session_scope.as_deref()) {
            // Global broadcasts reach everyone.
            (None, _) => true,
            // Scoped broadcasts reach all-subscribers and matching scopes.
            (Some(_), None) => true,
            (Some(target), Some(own)) => target == own,
        }
    }

    /// Non-blocking enqueue. `false` means the queue is full or the
    /// connection is gone — the caller should drop this client.
    pub fn try_send(&self, payload: String) -> bool {
        self.tx.try_send(payload).is_ok()
    }
}

/// Shared application state accessible from all route handlers.
pub struct AppState {
    /// Server start time for uptime tracking.
    pub start_time: Instant,
    /// Random per-process bearer credential; every authenticated route is
    /// nested under `/{security_token}`. Never persisted.
    pub security_token: String,
    pub config: ServerConfig,
    pub rate_limiter: RateLimiter,
    /// Connected WebSocket clients, keyed by connection id.
    pub clients: RwLock<HashMap<u64, WebClient>>,
    next_client_id: AtomicU64,
    /// Sessions currently visible to remote viewers.
    pub live_sessions: LiveSessionRegistry,
    /// Latest auto-run snapshot per session, retained only while running.
    pub auto_run: RwLock<HashMap<String, AutoRunState>>,
    /// Slots into the desktop side. Unset slots degrade, never panic.
    pub callbacks: SessionCallbacks,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        Self::with_callbacks(config, SessionCallbacks::default())
    }

    pub fn with_callbacks(config: ServerConfig, callbacks: SessionCallbacks) -> Arc<Self> {
        Arc::new(Self {
            start_time: Instant::now(),
            security_token: Uuid::new_v4().simple().to_string(),
            rate_limiter: RateLimiter::new(config.rate_limit.clone()),
            config,
            clients: RwLock::new(HashMap::new()),
            next_client_id: AtomicU64::new(1),
            live_sessions: LiveSessionRegistry::new(),
            auto_run: RwLock::new(HashMap::new()),
            callbacks,
        })
    }

    /// Get the server uptime in seconds.
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Register a newly accepted WebSocket connection.
    pub async fn add_client(
        &self,
        session_scope: Option<String>,
        tx: mpsc::Sender<String>,
    ) -> u64 {
        let id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let client = WebClient::new(id, session_scope, tx);
        self.clients.write().await.insert(id, client);
        tracing::info!(client_id = id, "web client connected");
        id
    }

    /// Remove a client on disconnect or transport error. Idempotent.
    pub async fn remove_client(&self, id: u64) {
        if self.clients.write().await.remove(&id).is_some() {
            tracing::info!(client_id = id, "web client disconnected");
        }
    }

    /// Re-scope a connected client (the `subscribe` message).
    pub async fn set_client_scope(&self, id: u64, scope: Option<String>) -> bool {
        match self.clients.write().await.get_mut(&id) {
            Some(client) => {
                client.session_scope = scope;
                true
            }
            None => false,
        }
    }

    /// Queue a payload for one specific client.
    pub async fn send_to_client(&self, id: u64, payload: String) {
        let delivered = {
            let clients = self.clients.read().await;
            match clients.get(&id) {
                Some(client) => client.try_send(payload),
                None => return,
            }
        };
        if !delivered {
            tracing::warn!(client_id = id, "client queue full, disconnecting");
            self.remove_client(id).await;
        }
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }
}
