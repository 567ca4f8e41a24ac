// crates/server/src/handler.rs
//! Inbound WebSocket message routing.
//!
//! A pure router: each message maps to one callback slot on the desktop
//! side. Every slot is optional — an unset slot yields a deterministic
//! negative reply (`ok: false` / `data: null`) so a partially-initialized
//! server degrades gracefully instead of dropping the client connection.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use serde::Deserialize;
use serde_json::{json, Value};

use agent_deck_types::SessionBroadcastData;

use crate::state::AppState;

type Slot<Args, Out> = Option<Arc<dyn Fn(Args) -> BoxFuture<'static, Out> + Send + Sync>>;

/// Callback slots into the desktop side. These are the only path by which
/// remote clients mutate real session state.
#[derive(Clone, Default)]
pub struct SessionCallbacks {
    /// Send text to a session's agent. Returns whether it was accepted.
    pub execute_command: Slot<(String, String), bool>,
    /// Interrupt the session's in-flight turn.
    pub interrupt: Slot<String, bool>,
    /// Switch the session's permission/agent mode.
    pub switch_mode: Slot<(String, String), bool>,
    /// Focus a session in the desktop UI.
    pub select_session: Slot<String, bool>,
    /// Focus a tab within a session.
    pub select_tab: Slot<(String, String), bool>,
    /// Open a new tab; returns the new tab id.
    pub new_tab: Slot<String, Option<String>>,
    pub close_tab: Slot<(String, String), bool>,
    pub rename_tab: Slot<(String, String, String), bool>,
    /// Full detail for one session (messages, tabs, usage).
    pub get_session_detail: Slot<String, Option<Value>>,
    /// Authoritative session list; the server filters it to live sessions.
    pub get_sessions: Slot<(), Vec<SessionBroadcastData>>,
    /// Conversation history for one session.
    pub get_history: Slot<String, Option<Value>>,
}

impl SessionCallbacks {
    async fn call<Args, Out>(slot: &Slot<Args, Out>, args: Args, fallback: Out) -> Out {
        match slot {
            Some(callback) => callback(args).await,
            None => fallback,
        }
    }
}

/// Inbound client messages. Closed set — anything else is rejected with a
/// modeled error reply, never a dropped connection.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Change which session's broadcasts this client receives.
    /// `session_id: null` subscribes to everything.
    Subscribe {
        #[serde(rename = "sessionId")]
        session_id: Option<String>,
    },
    Send {
        #[serde(rename = "sessionId")]
        session_id: String,
        text: String,
    },
    Interrupt {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SwitchMode {
        #[serde(rename = "sessionId")]
        session_id: String,
        mode: String,
    },
    SelectSession {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    SelectTab {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "tabId")]
        tab_id: String,
    },
    NewTab {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    CloseTab {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "tabId")]
        tab_id: String,
    },
    RenameTab {
        #[serde(rename = "sessionId")]
        session_id: String,
        #[serde(rename = "tabId")]
        tab_id: String,
        name: String,
    },
    GetSessionDetail {
        #[serde(rename = "sessionId")]
        session_id: String,
    },
    GetSessions,
    GetLiveSessions,
}

fn reply(request: &str, ok: bool, data: Value) -> String {
    json!({ "type": "reply", "request": request, "ok": ok, "data": data }).to_string()
}

fn error_reply(message: &str) -> String {
    json!({ "type": "error", "message": message }).to_string()
}

/// Route one inbound text frame. Always returns a reply to send back.
pub async fn handle_client_message(state: &Arc<AppState>, client_id: u64, text: &str) -> String {
    let message: ClientMessage = match serde_json::from_str(text) {
        Ok(message) => message,
        Err(err) => {
            tracing::debug!(client_id, error = %err, "unrecognized client message");
            return error_reply("unrecognized message");
        }
    };

    let callbacks = &state.callbacks;
    match message {
        ClientMessage::Subscribe { session_id } => {
            let ok = state.set_client_scope(client_id, session_id).await;
            reply("subscribe", ok, Value::Null)
        }
        ClientMessage::Send { session_id, text } => {
            let ok = SessionCallbacks::call(
                &callbacks.execute_command,
                (session_id, text),
                false,
            )
            .await;
            reply("send", ok, Value::Null)
        }
        ClientMessage::Interrupt { session_id } => {
            let ok = SessionCallbacks::call(&callbacks.interrupt, session_id, false).await;
            reply("interrupt", ok, Value::Null)
        }
        ClientMessage::SwitchMode { session_id, mode } => {
            let ok =
                SessionCallbacks::call(&callbacks.switch_mode, (session_id, mode), false).await;
            reply("switch_mode", ok, Value::Null)
        }
        ClientMessage::SelectSession { session_id } => {
            let ok = SessionCallbacks::call(&callbacks.select_session, session_id, false).await;
            reply("select_session", ok, Value::Null)
        }
        ClientMessage::SelectTab { session_id, tab_id } => {
            let ok =
                SessionCallbacks::call(&callbacks.select_tab, (session_id, tab_id), false).await;
            reply("select_tab", ok, Value::Null)
        }
        ClientMessage::NewTab { session_id } => {
            let tab_id = SessionCallbacks::call(&callbacks.new_tab, session_id, None).await;
            let ok = tab_id.is_some();
            reply("new_tab", ok, tab_id.map(Value::String).unwrap_or(Value::Null))
        }
        ClientMessage::CloseTab { session_id, tab_id } => {
            let ok =
                SessionCallbacks::call(&callbacks.close_tab, (session_id, tab_id), false).await;
            reply("close_tab", ok, Value::Null)
        }
        ClientMessage::RenameTab {
            session_id,
            tab_id,
            name,
        } => {
            let ok = SessionCallbacks::call(
                &callbacks.rename_tab,
                (session_id, tab_id, name),
                false,
            )
            .await;
            reply("rename_tab", ok, Value::Null)
        }
        ClientMessage::GetSessionDetail { session_id } => {
            let detail =
                SessionCallbacks::call(&callbacks.get_session_detail, session_id, None).await;
            let ok = detail.is_some();
            reply("get_session_detail", ok, detail.unwrap_or(Value::Null))
        }
        ClientMessage::GetSessions => {
            let sessions = state.live_session_list().await;
            reply(
                "get_sessions",
                true,
                serde_json::to_value(sessions).unwrap_or(Value::Null),
            )
        }
        ClientMessage::GetLiveSessions => {
            let live = state.live_sessions.list().await;
            reply(
                "get_live_sessions",
                true,
                serde_json::to_value(live).unwrap_or(Value::Null),
            )
        }
    }
}

impl AppState {
    /// The client-facing session list: the authoritative list from the
    /// desktop, filtered so only live sessions are ever exposed.
    pub async fn live_session_list(&self) -> Vec<SessionBroadcastData> {
        let all = SessionCallbacks::call(&self.callbacks.get_sessions, (), Vec::new()).await;
        let mut filtered = Vec::with_capacity(all.len());
        for session in all {
            if self.live_sessions.is_live(&session.id).await {
                filtered.push(session);
            }
        }
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ServerConfig;
    use futures_util::FutureExt;
    use tokio::sync::mpsc;

    fn state() -> Arc<AppState> {
        AppState::new(ServerConfig::default())
    }

    fn session(id: &str) -> SessionBroadcastData {
        SessionBroadcastData {
            id: id.into(),
            name: id.into(),
            working_dir: "/tmp".into(),
            agent_id: "claude".into(),
            state: "idle".into(),
            is_live: true,
            tabs: vec![],
            active_tab_id: None,
        }
    }

    #[tokio::test]
    async fn test_unset_callback_yields_negative_reply() {
        let state = state();
        let reply = handle_client_message(
            &state,
            1,
            r#"{"type":"send","sessionId":"s1","text":"hello"}"#,
        )
        .await;
        let wire: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(wire["ok"], false);
        assert_eq!(wire["request"], "send");
    }

    #[tokio::test]
    async fn test_unset_detail_callback_yields_null() {
        let state = state();
        let reply = handle_client_message(
            &state,
            1,
            r#"{"type":"get_session_detail","sessionId":"s1"}"#,
        )
        .await;
        let wire: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(wire["ok"], false);
        assert_eq!(wire["data"], Value::Null);
    }

    #[tokio::test]
    async fn test_wired_callback_is_invoked() {
        let mut callbacks = SessionCallbacks::default();
        callbacks.execute_command = Some(Arc::new(|(session_id, text): (String, String)| {
            async move { session_id == "s1" && text == "run" }.boxed()
        }));
        let state = AppState::with_callbacks(ServerConfig::default(), callbacks);

        let reply =
            handle_client_message(&state, 1, r#"{"type":"send","sessionId":"s1","text":"run"}"#)
                .await;
        let wire: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(wire["ok"], true);
    }

    #[tokio::test]
    async fn test_unrecognized_message_gets_modeled_error() {
        let state = state();
        let reply = handle_client_message(&state, 1, r#"{"type":"format_disk"}"#).await;
        let wire: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(wire["type"], "error");

        let reply = handle_client_message(&state, 1, "not even json").await;
        let wire: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(wire["type"], "error");
    }

    #[tokio::test]
    async fn test_subscribe_rescopes_client() {
        let state = state();
        let (tx, _rx) = mpsc::channel(4);
        let client_id = state.add_client(None, tx).await;

        let reply = handle_client_message(
            &state,
            client_id,
            r#"{"type":"subscribe","sessionId":"s1"}"#,
        )
        .await;
        let wire: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(wire["ok"], true);
        let clients = state.clients.read().await;
        assert_eq!(
            clients.get(&client_id).unwrap().session_scope.as_deref(),
            Some("s1")
        );
    }

    #[tokio::test]
    async fn test_sessions_list_only_ever_contains_live_sessions() {
        let mut callbacks = SessionCallbacks::default();
        callbacks.get_sessions = Some(Arc::new(|_: ()| {
            async move { vec![session("live-1"), session("hidden")] }.boxed()
        }));
        let state = AppState::with_callbacks(ServerConfig::default(), callbacks);
        state.live_sessions.set_live("live-1", None).await;

        let reply = handle_client_message(&state, 1, r#"{"type":"get_sessions"}"#).await;
        let wire: Value = serde_json::from_str(&reply).unwrap();
        let sessions = wire["data"].as_array().unwrap();
        assert_eq!(sessions.len(), 1);
        assert_eq!(sessions[0]["id"], "live-1");
    }

    #[tokio::test]
    async fn test_new_tab_returns_tab_id() {
        let mut callbacks = SessionCallbacks::default();
        callbacks.new_tab = Some(Arc::new(|_session_id: String| {
            async move { Some("tab-7".to_string()) }.boxed()
        }));
        let state = AppState::with_callbacks(ServerConfig::default(), callbacks);

        let reply =
            handle_client_message(&state, 1, r#"{"type":"new_tab","sessionId":"s1"}"#).await;
        let wire: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(wire["ok"], true);
        assert_eq!(wire["data"], "tab-7");
    }
}
