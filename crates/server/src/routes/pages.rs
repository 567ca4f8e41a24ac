// crates/server/src/routes/pages.rs
//! Minimal HTML pages for the dashboard and per-session view.
//!
//! These are thin shells: they load nothing but an inline script that opens
//! the WebSocket (relative to the token-prefixed path) and renders the
//! envelopes it receives. All real state comes over the socket.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::Html,
    routing::get,
    Router,
};

use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(dashboard))
        .route("/session/{id}", get(session_page))
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        "<!doctype html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
         <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">\n\
         <title>{title}</title>\n</head>\n<body>\n{body}\n</body>\n</html>\n"
    ))
}

/// GET / -- the dashboard. Lists live sessions via the WebSocket.
async fn dashboard(State(_state): State<Arc<AppState>>) -> Html<String> {
    page(
        "agent-deck",
        r#"<h1>agent-deck</h1>
<ul id="sessions"></ul>
<script>
const ws = new WebSocket(`ws${location.protocol === "https:" ? "s" : ""}://${location.host}${location.pathname.replace(/\/$/, "")}/ws`);
ws.onopen = () => ws.send(JSON.stringify({ type: "get_sessions" }));
ws.onmessage = (e) => {
  const msg = JSON.parse(e.data);
  const sessions = msg.type === "sessions_list" ? msg.sessions
    : msg.type === "reply" && msg.request === "get_sessions" ? msg.data : null;
  if (!sessions) return;
  const list = document.getElementById("sessions");
  list.innerHTML = "";
  for (const s of sessions) {
    const li = document.createElement("li");
    const a = document.createElement("a");
    a.href = `${location.pathname.replace(/\/$/, "")}/session/${s.id}`;
    a.textContent = `${s.name} — ${s.state}`;
    li.appendChild(a);
    list.appendChild(li);
  }
};
</script>"#,
    )
}

/// GET /session/{id} -- one session's live view.
async fn session_page(State(_state): State<Arc<AppState>>, Path(id): Path<String>) -> Html<String> {
    let body = format!(
        r#"<h1 id="title"></h1>
<pre id="log"></pre>
<script>
const sessionId = {session_id};
document.getElementById("title").textContent = sessionId;
const base = location.pathname.replace(/\/session\/.*$/, "");
const ws = new WebSocket(`ws${{location.protocol === "https:" ? "s" : ""}}://${{location.host}}${{base}}/ws?sessionId=${{encodeURIComponent(sessionId)}}`);
ws.onmessage = (e) => {{
  document.getElementById("log").textContent += e.data + "\n";
}};
</script>"#,
        session_id = serde_json::to_string(&id).unwrap_or_else(|_| "\"\"".into()),
    );
    page("agent-deck session", &body)
}
