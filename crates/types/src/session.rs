// crates/types/src/session.rs
//! Read-only wire projections of session and tab state.
//!
//! The desktop side owns the authoritative objects; these shapes exist so the
//! broadcast layer can mirror them to remote viewers without mutating
//! anything.

use serde::{Deserialize, Serialize};

/// Membership record in the live-session registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveSessionInfo {
    /// Internal session id (the key everything else correlates on).
    pub session_id: String,
    /// The agent's own continuity id, once known. Distinct from
    /// `session_id` — Claude's `session_id` / Codex's `thread_id`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_session_id: Option<String>,
    /// Unix seconds when the session was made visible to remote viewers.
    pub enabled_at: i64,
}

/// Per-session batch-run progress, mirrored so a reconnecting client can
/// resync mid-run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoRunState {
    pub is_running: bool,
    pub completed_tasks: u32,
    pub total_tasks: u32,
    pub is_stopping: bool,
}

/// One conversational thread within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiTabData {
    pub id: String,
    pub name: String,
    /// The agent continuity id bound to this tab, once a conversation exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_session_id: Option<String>,
    pub is_active: bool,
}

/// Wire projection of one session for the remote sessions list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBroadcastData {
    pub id: String,
    pub name: String,
    pub working_dir: String,
    /// Which adapter drives this session ("claude", "codex", ...).
    pub agent_id: String,
    /// Coarse session state for the dashboard ("idle", "running", ...).
    pub state: String,
    pub is_live: bool,
    pub tabs: Vec<AiTabData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_tab_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_session_info_omits_unknown_agent_id() {
        let info = LiveSessionInfo {
            session_id: "s1".into(),
            agent_session_id: None,
            enabled_at: 1700000000,
        };
        let wire = serde_json::to_value(&info).unwrap();
        assert!(wire.get("agentSessionId").is_none());
        assert_eq!(wire["sessionId"], "s1");
    }

    #[test]
    fn test_session_broadcast_round_trip() {
        let data = SessionBroadcastData {
            id: "s1".into(),
            name: "api work".into(),
            working_dir: "/tmp/api".into(),
            agent_id: "claude".into(),
            state: "running".into(),
            is_live: true,
            tabs: vec![AiTabData {
                id: "t1".into(),
                name: "main".into(),
                agent_session_id: Some("abc".into()),
                is_active: true,
            }],
            active_tab_id: Some("t1".into()),
        };
        let wire = serde_json::to_string(&data).unwrap();
        let back: SessionBroadcastData = serde_json::from_str(&wire).unwrap();
        assert_eq!(back, data);
    }
}
