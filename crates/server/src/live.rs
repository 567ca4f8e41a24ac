// crates/server/src/live.rs
//! Registry of sessions currently visible to remote viewers.
//!
//! Membership is explicit opt-in: nothing is mirrored to the web until the
//! desktop side calls `set_live`, and everything disappears on `set_offline`
//! or server shutdown. The registry itself is pure bookkeeping — the
//! synchronous broadcast that accompanies each toggle lives on `AppState`
//! (see `broadcast.rs`) so already-connected clients converge immediately.

use std::collections::HashMap;

use tokio::sync::RwLock;

use agent_deck_types::LiveSessionInfo;

#[derive(Default)]
pub struct LiveSessionRegistry {
    sessions: RwLock<HashMap<String, LiveSessionInfo>>,
}

impl LiveSessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a session live. Re-marking an already-live session overwrites
    /// its entry (refreshing `agent_session_id`), never duplicates it.
    pub async fn set_live(
        &self,
        session_id: impl Into<String>,
        agent_session_id: Option<String>,
    ) -> LiveSessionInfo {
        let session_id = session_id.into();
        let info = LiveSessionInfo {
            session_id: session_id.clone(),
            agent_session_id,
            enabled_at: chrono::Utc::now().timestamp(),
        };
        self.sessions.write().await.insert(session_id, info.clone());
        info
    }

    /// Remove a session. Returns the entry if it was live.
    pub async fn set_offline(&self, session_id: &str) -> Option<LiveSessionInfo> {
        self.sessions.write().await.remove(session_id)
    }

    pub async fn is_live(&self, session_id: &str) -> bool {
        self.sessions.read().await.contains_key(session_id)
    }

    pub async fn get(&self, session_id: &str) -> Option<LiveSessionInfo> {
        self.sessions.read().await.get(session_id).cloned()
    }

    /// All live sessions, most recently enabled first.
    pub async fn list(&self) -> Vec<LiveSessionInfo> {
        let mut sessions: Vec<_> = self.sessions.read().await.values().cloned().collect();
        sessions.sort_by(|a, b| b.enabled_at.cmp(&a.enabled_at).then(a.session_id.cmp(&b.session_id)));
        sessions
    }

    /// Drain every entry — used when the server stops, where all live
    /// sessions are force-offlined.
    pub async fn drain(&self) -> Vec<LiveSessionInfo> {
        self.sessions.write().await.drain().map(|(_, info)| info).collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }
}
