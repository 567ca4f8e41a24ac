// crates/parsers/src/claude.rs
//! Output parser adapter for the Claude Code CLI (`--output-format stream-json`).
//!
//! Claude frames one JSON object per stdout line:
//! `{type, subtype?, session_id?, result?, message?, slash_commands?,
//! modelUsage?, usage?, total_cost_usd?}`. Fields are decoded defensively —
//! multiple optional fields can co-occur, and presence of one never implies a
//! particular message type.

use agent_deck_types::{
    AgentError, AgentErrorKind, EventKind, ParsedEvent, ToolUseBlock, UsageStats,
};
use serde_json::Value;
use tracing::debug;

use crate::patterns::{claude_patterns, PatternSet};
use crate::usage::claude_usage;
use crate::AgentOutputParser;

const AGENT_ID: &str = "claude";

pub struct ClaudeOutputParser {
    patterns: PatternSet,
}

impl ClaudeOutputParser {
    pub fn new() -> Self {
        Self {
            patterns: claude_patterns(),
        }
    }
}

impl Default for ClaudeOutputParser {
    fn default() -> Self {
        Self::new()
    }
}

/// Concatenate `text`-type content blocks. `thinking` and
/// `redacted_thinking` blocks are excluded — they are a separate, UI-gated
/// channel and must never leak into the text payload.
fn text_from_blocks(content: &Value) -> Option<String> {
    let blocks = content.as_array()?;
    let parts: Vec<&str> = blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|block| block.get("text").and_then(Value::as_str))
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    }
}

/// Hoist `tool_use` content blocks into the canonical block shape.
fn tool_use_blocks(content: &Value) -> Vec<ToolUseBlock> {
    let Some(blocks) = content.as_array() else {
        return Vec::new();
    };
    blocks
        .iter()
        .filter(|block| block.get("type").and_then(Value::as_str) == Some("tool_use"))
        .filter_map(|block| {
            Some(ToolUseBlock {
                id: block.get("id").and_then(Value::as_str).map(String::from),
                name: block.get("name").and_then(Value::as_str)?.to_string(),
                input: block.get("input").cloned().unwrap_or(Value::Null),
            })
        })
        .collect()
}

fn slash_commands_from(raw: &Value) -> Option<Vec<String>> {
    let commands = raw.get("slash_commands")?.as_array()?;
    Some(
        commands
            .iter()
            .filter_map(Value::as_str)
            .map(String::from)
            .collect(),
    )
}

/// Pull a human-readable message out of a structured error payload.
/// Accepts `{message: "..."}`, `{error: "..."}` and `{error: {message}}`.
fn structured_error_message(raw: &Value) -> Option<String> {
    if let Some(message) = raw.get("message").and_then(Value::as_str) {
        return Some(message.to_string());
    }
    match raw.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(inner) => inner
            .get("message")
            .and_then(Value::as_str)
            .map(String::from),
        None => None,
    }
}

impl AgentOutputParser for ClaudeOutputParser {
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

        let session_id = raw
            .get("session_id")
            .and_then(Value::as_str)
            .map(String::from);
        let message_content = raw.get("message").and_then(|m| m.get("content"));

        let event = match raw.get("type").and_then(Value::as_str) {
            Some("system") if raw.get("subtype").and_then(Value::as_str) == Some("init") => {
                let mut event = ParsedEvent::new(EventKind::Init, raw.clone());
                if let Some(commands) = slash_commands_from(&raw) {
                    event = event.with_slash_commands(commands);
                }
                event
            }
            Some("result") => {
                let text = raw
                    .get("result")
                    .and_then(Value::as_str)
                    .map(String::from)
                    .or_else(|| message_content.and_then(text_from_blocks));
                let mut event = ParsedEvent::new(EventKind::Result, raw.clone());
                if let Some(text) = text {
                    event = event.with_text(text);
                }
                if let Some(usage) = claude_usage(&raw) {
                    event = event.with_usage(usage);
                }
                event
            }
            Some("assistant") => {
                let text = message_content.and_then(text_from_blocks).unwrap_or_default();
                let blocks = message_content.map(tool_use_blocks).unwrap_or_default();
                ParsedEvent::text(text, raw.clone())
                    .partial()
                    .with_tool_use_blocks(blocks)
            }
            // Unknown upstream types degrade to system events rather than
            // being silently dropped.
            Some(_) => ParsedEvent::new(EventKind::System, raw.clone()),
            None => {
                // No recognized type: a message carrying only usage/cost
                // fields is a usage event, anything else is system noise.
                match claude_usage(&raw) {
                    Some(usage) => ParsedEvent::new(EventKind::Usage, raw.clone()).with_usage(usage),
                    None => ParsedEvent::new(EventKind::System, raw.clone()),
                }
            }
        };

        Some(match session_id {
            Some(id) => event.with_session_id(id),
            None => event,
        })
    }

    fn is_result_message(&self, event: &ParsedEvent) -> bool {
        event.kind == EventKind::Result
    }

    fn extract_session_id(&self, event: &ParsedEvent) -> Option<String> {
        event.session_id.clone().or_else(|| {
            event
                .raw
                .get("session_id")
                .and_then(Value::as_str)
                .map(String::from)
        })
    }

    fn extract_usage(&self, event: &ParsedEvent) -> Option<UsageStats> {
        event.usage.clone().or_else(|| claude_usage(&event.raw))
    }

    fn extract_slash_commands(&self, event: &ParsedEvent) -> Option<Vec<String>> {
        event
            .slash_commands
            .clone()
            .or_else(|| slash_commands_from(&event.raw))
    }

    fn detect_error_from_line(&self, line: &str) -> Option<AgentError> {
        let raw: Value = serde_json::from_str(line.trim()).ok()?;
        if raw.get("type").and_then(Value::as_str) != Some("error") {
            return None;
        }
        let message =
            structured_error_message(&raw).unwrap_or_else(|| "unknown agent error".to_string());
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
