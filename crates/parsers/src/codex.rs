// crates/parsers/src/codex.rs
//! Output parser adapter for the OpenAI Codex CLI (`codex exec --json`).
//!
//! Codex frames `{type, thread_id?, item?, usage?, error?}` per line with a
//! nested item shape `{id?, type, text?, tool?, args?, output?}`. The
//! authoritative response text is the `agent_message` item — `turn.completed`
//! only carries usage, despite ending the turn.

use agent_deck_types::{
    AgentError, AgentErrorKind, EventKind, ParsedEvent, ToolState, UsageStats,
};
use serde_json::Value;
use tracing::debug;

use crate::patterns::{codex_patterns, PatternSet};
use crate::usage::codex_turn_usage;
use crate::AgentOutputParser;

const AGENT_ID: &str = "codex";

/// Fallback when the model is unknown and no override is configured.
const DEFAULT_CONTEXT_WINDOW: u64 = 272_000;

/// Known model context windows. Exact name match first, then prefix match.
const CONTEXT_WINDOWS: &[(&str, u64)] = &[
    ("gpt-5.1-codex-max", 272_000),
    ("gpt-5.1-codex-mini", 272_000),
    ("gpt-5.1-codex", 272_000),
    ("gpt-5-codex", 272_000),
    ("gpt-5.1", 272_000),
    ("gpt-5", 272_000),
    ("gpt-4.1", 1_047_576),
    ("gpt-4o", 128_000),
    ("o4-mini", 200_000),
    ("o3", 200_000),
];

/// Read-once adapter configuration.
#[derive(Debug, Clone, Default)]
pub struct CodexConfig {
    /// Explicit context window, overriding any model lookup.
    pub context_window_override: Option<u64>,
    /// Model name the CLI was launched with, for table lookup.
    pub model: Option<String>,
}

pub struct CodexOutputParser {
    patterns: PatternSet,
    /// Resolved once at construction; never re-resolved per message.
    context_window: u64,
}

impl CodexOutputParser {
    pub fn new() -> Self {
        Self::with_config(CodexConfig::default())
    }

    pub fn with_config(config: CodexConfig) -> Self {
        Self {
            patterns: codex_patterns(),
            context_window: resolve_context_window(&config),
        }
    }

    #[cfg(test)]
    fn context_window(&self) -> u64 {
        self.context_window
    }
}

impl Default for CodexOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Override → exact model match → model prefix match → default.
fn resolve_context_window(config: &CodexConfig) -> u64 {
    if let Some(window) = config.context_window_override {
        return window;
    }
    let Some(model) = config.model.as_deref() else {
        return DEFAULT_CONTEXT_WINDOW;
    };
    if let Some((_, window)) = CONTEXT_WINDOWS.iter().find(|(name, _)| *name == model) {
        return *window;
    }
    CONTEXT_WINDOWS
        .iter()
        .find(|(name, _)| model.starts_with(name))
        .map(|(_, window)| *window)
        .unwrap_or(DEFAULT_CONTEXT_WINDOW)
}

/// Decode a tool output that may arrive as a string or as a JSON byte array.
///
/// Byte arrays are folded through an iterator — never collected onto the
/// stack — so multi-megabyte tool outputs cannot overflow anything.
fn decode_output(output: &Value) -> Option<String> {
    match output {
        Value::String(text) => Some(text.clone()),
        Value::Array(bytes) => {
            let buf: Vec<u8> = bytes
                .iter()
                .filter_map(Value::as_u64)
                .map(|byte| byte as u8)
                .collect();
            Some(String::from_utf8_lossy(&buf).into_owned())
        }
        _ => None,
    }
}

fn item_text(item: &Value) -> String {
    item.get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn item_tool_name(item: &Value) -> String {
    item.get("tool")
        .and_then(Value::as_str)
        .unwrap_or("tool")
        .to_string()
}

impl AgentOutputParser for CodexOutputParser {
    fn agent_id(&self) -> &str {
        AGENT_ID
    }

    fn parse_json_line(&self, line: &str) -> Option<ParsedEvent> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return None;
        }

        let raw: Value = match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(err) => {
                debug!(agent = AGENT_ID, error = %err, "non-JSON stdout line, degrading to text");
                return Some(ParsedEvent::text(line, Value::String(line.to_string())));
            }
        };

        let event = match raw.get("type").and_then(Value::as_str) {
            Some("thread.started") => {
                let mut event = ParsedEvent::new(EventKind::Init, raw.clone());
                if let Some(thread_id) = raw.get("thread_id").and_then(Value::as_str) {
                    event = event.with_session_id(thread_id);
                }
                event
            }
            Some("item.completed") => {
                let item = raw.get("item").cloned().unwrap_or(Value::Null);
                match item.get("type").and_then(Value::as_str) {
                    // The model's visible reasoning trace.
                    Some("reasoning") => ParsedEvent::text(item_text(&item), raw.clone()).partial(),
                    // The authoritative response text for the turn.
                    Some("agent_message") => ParsedEvent::new(EventKind::Result, raw.clone())
                        .with_text(item_text(&item)),
                    Some("tool_call") => {
                        let state = ToolState::running(item.get("args").cloned());
                        ParsedEvent::new(EventKind::ToolUse, raw.clone())
                            .with_tool(item_tool_name(&item), state)
                    }
                    Some("tool_result") => {
                        let output = item.get("output").and_then(decode_output);
                        let state = ToolState::completed(output);
                        ParsedEvent::new(EventKind::ToolUse, raw.clone())
                            .with_tool(item_tool_name(&item), state)
                    }
                    _ => ParsedEvent::new(EventKind::System, raw.clone()),
                }
            }
            // Usage only — NOT a result, despite ending the turn.
            Some("turn.completed") => {
                let mut event = ParsedEvent::new(EventKind::Usage, raw.clone());
                if let Some(usage) = raw
                    .get("usage")
                    .and_then(|usage| codex_turn_usage(usage, self.context_window))
                {
                    event = event.with_usage(usage);
                }
                event
            }
            // turn.started and everything unrecognized degrade to system.
            _ => ParsedEvent::new(EventKind::System, raw.clone()),
        };

        Some(event)
    }

    fn is_result_message(&self, event: &ParsedEvent) -> bool {
        event.kind == EventKind::Result
    }

    fn extract_session_id(&self, event: &ParsedEvent) -> Option<String> {
        event.session_id.clone().or_else(|| {
            event
                .raw
                .get("thread_id")
                .and_then(Value::as_str)
                .map(String::from)
        })
    }

    fn extract_usage(&self, event: &ParsedEvent) -> Option<UsageStats> {
        event.usage.clone().or_else(|| {
            event
                .raw
                .get("usage")
                .and_then(|usage| codex_turn_usage(usage, self.context_window))
        })
    }

    /// Codex has no discoverable slash-command concept; never fabricate one.
    fn extract_slash_commands(&self, _event: &ParsedEvent) -> Option<Vec<String>> {
        None
    }

    fn detect_error_from_line(&self, line: &str) -> Option<AgentError> {
        let raw: Value = serde_json::from_str(line.trim()).ok()?;
        let message = match raw.get("type").and_then(Value::as_str) {
            Some("error") => raw
                .get("message")
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| "unknown agent error".to_string()),
            Some("turn.failed") => raw
                .get("error")
                .and_then(|error| error.get("message"))
                .and_then(Value::as_str)
                .map(String::from)
                .unwrap_or_else(|| "turn failed".to_string()),
            _ => return None,
        };
        let (kind, recoverable) = match self.patterns.classify(&message) {
            Some(rule) => (rule.kind, rule.recoverable),
            None => (AgentErrorKind::Fatal, false),
        };
        Some(AgentError::from_line(kind, recoverable, message, AGENT_ID, line))
    }

    fn detect_error_from_exit(
        &self,
        exit_code: i32,
        stderr: &str,
        stdout: &str,
    ) -> Option<AgentError> {
        if exit_code == 0 {
            return None;
        }
        let combined = format!("{stderr}\n{stdout}");
        match self.patterns.classify(&combined) {
            Some(rule) => {
                let message = stderr
                    .lines()
                    .find(|l| !l.trim().is_empty())
                    .unwrap_or("agent exited with an error")
                    .to_string();
                Some(AgentError::from_exit(
                    rule.kind,
                    rule.recoverable,
                    message,
                    AGENT_ID,
                    exit_code,
                    stdout,
                    stderr,
                ))
            }
            None => Some(AgentError::from_exit(
                AgentErrorKind::Crashed,
                true,
                format!("agent exited with code {exit_code}"),
                AGENT_ID,
                exit_code,
                stdout,
                stderr,
            )),
        }
    }
}
