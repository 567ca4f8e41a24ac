// crates/types/src/event.rs
//! The canonical, agent-agnostic event model.
//!
//! Every output parser adapter turns one JSONL line into at most one
//! `ParsedEvent`. Downstream consumers (the session-state reducer, the
//! broadcast layer) only ever see this shape — never an agent's raw wire
//! format.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::usage::UsageStats;

/// Discriminant for `ParsedEvent`. Closed set — adapters map unknown
/// upstream message types to `System` rather than inventing new kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Session handshake: carries the agent's continuity id.
    Init,
    /// Conversational text; `is_partial` marks streamed/incomplete output.
    Text,
    /// A tool invocation or its result.
    ToolUse,
    /// The authoritative final response text for a turn.
    Result,
    /// A structured, modeled agent error.
    Error,
    /// Token/cost accounting with no other payload.
    Usage,
    /// Anything informational that doesn't fit the above.
    System,
}

/// Lifecycle of a tool invocation as reported by the agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Running,
    Completed,
}

/// State attached to a `ToolUse` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolState {
    pub status: ToolStatus,
    /// Tool arguments, present while running.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Value>,
    /// Decoded tool output, present once completed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
}

impl ToolState {
    pub fn running(input: Option<Value>) -> Self {
        Self {
            status: ToolStatus::Running,
            input,
            output: None,
        }
    }

    pub fn completed(output: Option<String>) -> Self {
        Self {
            status: ToolStatus::Completed,
            input: None,
            output,
        }
    }
}

/// A tool invocation embedded inside a text message (parallel tool calls).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolUseBlock {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub input: Value,
}

/// One unit of normalized agent output.
///
/// Exactly one semantic payload is populated per `kind`; `raw` always holds
/// the original decoded payload verbatim for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedEvent {
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Agent continuity id (Claude `session_id`, Codex `thread_id`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_state: Option<ToolState>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<UsageStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slash_commands: Option<Vec<String>>,
    /// Set (true) only for streamed/incomplete text. Unset means final.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_partial: Option<bool>,
    /// Parallel tool invocations hoisted out of a text message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use_blocks: Option<Vec<ToolUseBlock>>,
    /// Original decoded payload, preserved verbatim.
    pub raw: Value,
}

impl ParsedEvent {
    pub fn new(kind: EventKind, raw: Value) -> Self {
        Self {
            kind,
            session_id: None,
            text: None,
            tool_name: None,
            tool_state: None,
            usage: None,
            slash_commands: None,
            is_partial: None,
            tool_use_blocks: None,
            raw,
        }
    }

    /// A plain text event. Used both for model output and for the
    /// malformed-line fallback (where `raw` is the line itself).
    pub fn text(text: impl Into<String>, raw: Value) -> Self {
        let mut event = Self::new(EventKind::Text, raw);
        event.text = Some(text.into());
        event
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_tool(mut self, name: impl Into<String>, state: ToolState) -> Self {
        self.tool_name = Some(name.into());
        self.tool_state = Some(state);
        self
    }

    pub fn with_usage(mut self, usage: UsageStats) -> Self {
        self.usage = Some(usage);
        self
    }

    pub fn with_slash_commands(mut self, commands: Vec<String>) -> Self {
        self.slash_commands = Some(commands);
        self
    }

    pub fn partial(mut self) -> Self {
        self.is_partial = Some(true);
        self
    }

    pub fn with_tool_use_blocks(mut self, blocks: Vec<ToolUseBlock>) -> Self {
        if !blocks.is_empty() {
            self.tool_use_blocks = Some(blocks);
        }
        self
    }
}
