// crates/server/src/broadcast.rs
//! Fan-out of normalized state changes to connected WebSocket clients.
//!
//! The wire protocol is closed: one envelope variant per broadcast kind,
//! discriminated by a top-level `type` field. There is deliberately no
//! generic "send anything" operation.
//!
//! Delivery is fire-and-forget per client. Each client owns a bounded
//! outbound queue; a `try_send` that finds the queue full (or the connection
//! gone) marks that client dead and it is removed after the loop — one slow
//! consumer can never stall delivery to its siblings.

use agent_deck_types::{AiTabData, AutoRunState, LiveSessionInfo, SessionBroadcastData};
use serde::Serialize;

use crate::state::AppState;

/// Outbound envelope. Consumers identify the kind via the `type` field.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BroadcastMessage {
    SessionLive {
        session: LiveSessionInfo,
    },
    SessionOffline {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SessionsList {
        sessions: Vec<SessionBroadcastData>,
    },
    SessionStateChange {
        #[serde(rename = "sessionId")]
        session_id: String,
        state: String,
    },
    TabsChange {
        #[serde(rename = "sessionId")]
        session_id: String,
        tabs: Vec<AiTabData>,
        #[serde(rename = "activeTabId", skip_serializing_if = "Option::is_none")]
        active_tab_id: Option<String>,
    },
    ThemeChange {
        theme: String,
    },
    CustomCommandsChange {
        commands: Vec<String>,
    },
    AutoRunState {
        #[serde(rename = "sessionId")]
        session_id: String,
        state: AutoRunState,
    },
    /// Echo of text the desktop user typed, so remote viewers stay in sync.
    UserInput {
        #[serde(rename = "sessionId")]
        session_id: String,
        text: String,
    },
}

impl AppState {
    /// Serialize an envelope and deliver it to every in-scope client.
    ///
    /// `scope == None` is a global broadcast; `scope == Some(id)` reaches
    /// clients subscribed to that session plus all-subscribers.
    async fn deliver(&self, scope: Option<&str>, message: &BroadcastMessage) {
        let payload = match serde_json::to_string(message) {
            Ok(payload) => payload,
            Err(err) => {
                tracing::error!(error = %err, "failed to serialize broadcast envelope");
                return;
            }
        };

        let mut dead = Vec::new();
        {
            let clients = self.clients.read().await;
            for client in clients.values() {
                if !client.in_scope(scope) {
                    continue;
                }
                if !client.try_send(payload.clone()) {
                    dead.push(client.id);
                }
            }
        }
        for id in dead {
            tracing::warn!(client_id = id, "dropping client: send queue full or closed");
            self.remove_client(id).await;
        }
    }

    /// Mark a session live and synchronously tell every connected client.
    pub async fn set_session_live(
        &self,
        session_id: impl Into<String>,
        agent_session_id: Option<String>,
    ) {
        let info = self.live_sessions.set_live(session_id, agent_session_id).await;
        tracing::info!(session_id = %info.session_id, "session live");
        self.deliver(None, &BroadcastMessage::SessionLive { session: info })
            .await;
    }

    /// Take a session offline and synchronously tell every connected client.
    /// A session that was never live broadcasts nothing.
    pub async fn set_session_offline(&self, session_id: &str) {
        if self.live_sessions.set_offline(session_id).await.is_some() {
            tracing::info!(session_id, "session offline");
            self.deliver(
                None,
                &BroadcastMessage::SessionOffline {
                    session_id: session_id.to_string(),
                },
            )
            .await;
        }
        self.auto_run.write().await.remove(session_id);
    }

    pub async fn broadcast_sessions_list(&self, sessions: Vec<SessionBroadcastData>) {
        self.deliver(None, &BroadcastMessage::SessionsList { sessions })
            .await;
    }

    pub async fn broadcast_session_state(&self, session_id: &str, state: impl Into<String>) {
        self.deliver(
            Some(session_id),
            &BroadcastMessage::SessionStateChange {
                session_id: session_id.to_string(),
                state: state.into(),
            },
        )
        .await;
    }

    pub async fn broadcast_tabs_change(
        &self,
        session_id: &str,
        tabs: Vec<AiTabData>,
        active_tab_id: Option<String>,
    ) {
        self.deliver(
            Some(session_id),
            &BroadcastMessage::TabsChange {
                session_id: session_id.to_string(),
                tabs,
                active_tab_id,
            },
        )
        .await;
    }

    pub async fn broadcast_theme_change(&self, theme: impl Into<String>) {
        self.deliver(None, &BroadcastMessage::ThemeChange { theme: theme.into() })
            .await;
    }

    pub async fn broadcast_custom_commands(&self, commands: Vec<String>) {
        self.deliver(None, &BroadcastMessage::CustomCommandsChange { commands })
            .await;
    }

    /// Broadcast batch-run progress. The latest snapshot is retained per
    /// session while the run is active so a client connecting mid-run can
    /// resync; it is purged the moment the run stops.
    pub async fn broadcast_auto_run_state(&self, session_id: &str, state: AutoRunState) {
        {
            let mut snapshots = self.auto_run.write().await;
            if state.is_running {
                snapshots.insert(session_id.to_string(), state.clone());
            } else {
                snapshots.remove(session_id);
            }
        }
        self.deliver(
            Some(session_id),
            &BroadcastMessage::AutoRunState {
                session_id: session_id.to_string(),
                state,
            },
        )
        .await;
    }

    pub async fn broadcast_user_input(&self, session_id: &str, text: impl Into<String>) {
        self.deliver(
            Some(session_id),
            &BroadcastMessage::UserInput {
                session_id: session_id.to_string(),
                text: text.into(),
            },
        )
        .await;
    }

    /// Force-offline every live session. Called on server stop.
    pub async fn offline_all(&self) {
        for info in self.live_sessions.drain().await {
            self.deliver(
                None,
                &BroadcastMessage::SessionOffline {
                    session_id: info.session_id.clone(),
                },
            )
            .await;
        }
        self.auto_run.write().await.clear();
    }
}
