//! End-to-end tests over a real TCP listener and WebSocket client.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use agent_deck_server::{create_app, AppState, ServerConfig};

type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Bind an ephemeral port and serve the app in the background.
async fn spawn_server(state: Arc<AppState>) -> SocketAddr {
    let app = create_app(state);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });
    addr
}

async fn connect(addr: SocketAddr, path: &str) -> WsClient {
    let (client, _) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("websocket handshake");
    client
}

/// Read the next text frame as JSON, within a deadline.
async fn next_json(client: &mut WsClient) -> serde_json::Value {
    let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
        .await
        .expect("frame before deadline")
        .expect("stream open")
        .expect("frame ok");
    serde_json::from_str(frame.to_text().expect("text frame")).expect("json frame")
}

#[tokio::test]
async fn ws_client_is_hydrated_then_receives_broadcasts() {
    let state = AppState::new(ServerConfig::default());
    let token = state.security_token.clone();
    let addr = spawn_server(state.clone()).await;

    let mut client = connect(addr, &format!("/{token}/ws")).await;

    // Hydration: the current (empty) sessions list arrives first.
    let hydration = next_json(&mut client).await;
    assert_eq!(hydration["type"], "sessions_list");
    assert_eq!(hydration["sessions"].as_array().unwrap().len(), 0);

    // A live toggle converges already-connected clients immediately.
    state.set_session_live("s1", Some("agent-abc".into())).await;
    let live = next_json(&mut client).await;
    assert_eq!(live["type"], "session_live");
    assert_eq!(live["session"]["sessionId"], "s1");
    assert_eq!(live["session"]["agentSessionId"], "agent-abc");

    state.set_session_offline("s1").await;
    let offline = next_json(&mut client).await;
    assert_eq!(offline["type"], "session_offline");
    assert_eq!(offline["sessionId"], "s1");
}

#[tokio::test]
async fn ws_scoped_clients_see_only_their_session() {
    let state = AppState::new(ServerConfig::default());
    let token = state.security_token.clone();
    let addr = spawn_server(state.clone()).await;

    let mut client_a = connect(addr, &format!("/{token}/ws?sessionId=s1")).await;
    let mut client_b = connect(addr, &format!("/{token}/ws?sessionId=s2")).await;
    let mut client_all = connect(addr, &format!("/{token}/ws")).await;

    // Drain hydration frames.
    next_json(&mut client_a).await;
    next_json(&mut client_b).await;
    next_json(&mut client_all).await;

    state.broadcast_session_state("s1", "running").await;
    state.broadcast_session_state("s2", "idle").await;

    let got_a = next_json(&mut client_a).await;
    assert_eq!(got_a["sessionId"], "s1");
    let got_b = next_json(&mut client_b).await;
    assert_eq!(got_b["sessionId"], "s2");

    // The unscoped client sees both, in emission order.
    let first = next_json(&mut client_all).await;
    let second = next_json(&mut client_all).await;
    assert_eq!(first["sessionId"], "s1");
    assert_eq!(second["sessionId"], "s2");

    // And the scoped clients got exactly one frame each.
    let quiet = tokio::time::timeout(Duration::from_millis(200), client_a.next()).await;
    assert!(quiet.is_err(), "client_a should receive nothing further");
}

#[tokio::test]
async fn ws_routes_commands_and_replies() {
    let state = AppState::new(ServerConfig::default());
    let token = state.security_token.clone();
    let addr = spawn_server(state.clone()).await;

    let mut client = connect(addr, &format!("/{token}/ws")).await;
    next_json(&mut client).await; // hydration

    client
        .send(Message::Text(
            r#"{"type":"send","sessionId":"s1","text":"hello"}"#.into(),
        ))
        .await
        .unwrap();

    // No callback wired: deterministic negative reply, connection stays up.
    let reply = next_json(&mut client).await;
    assert_eq!(reply["type"], "reply");
    assert_eq!(reply["request"], "send");
    assert_eq!(reply["ok"], false);

    client
        .send(Message::Text(r#"{"type":"get_live_sessions"}"#.into()))
        .await
        .unwrap();
    let reply = next_json(&mut client).await;
    assert_eq!(reply["request"], "get_live_sessions");
    assert_eq!(reply["ok"], true);
}

#[tokio::test]
async fn ws_handshake_fails_without_token() {
    let state = AppState::new(ServerConfig::default());
    let addr = spawn_server(state).await;

    let result = connect_async(format!("ws://{addr}/ws")).await;
    assert!(result.is_err(), "handshake must be rejected without the token");

    let result = connect_async(format!(
        "ws://{addr}/00000000000000000000000000000000/ws"
    ))
    .await;
    assert!(result.is_err(), "handshake must be rejected with a wrong token");
}

#[tokio::test]
async fn auto_run_snapshot_reaches_late_joiners() {
    let state = AppState::new(ServerConfig::default());
    let token = state.security_token.clone();
    let addr = spawn_server(state.clone()).await;

    state
        .broadcast_auto_run_state(
            "s1",
            agent_deck_types::AutoRunState {
                is_running: true,
                completed_tasks: 2,
                total_tasks: 9,
                is_stopping: false,
            },
        )
        .await;

    // A client connecting mid-run receives the retained snapshot.
    let mut client = connect(addr, &format!("/{token}/ws?sessionId=s1")).await;
    let hydration = next_json(&mut client).await;
    assert_eq!(hydration["type"], "sessions_list");
    let snapshot = next_json(&mut client).await;
    assert_eq!(snapshot["type"], "auto_run_state");
    assert_eq!(snapshot["state"]["completedTasks"], 2);
}
