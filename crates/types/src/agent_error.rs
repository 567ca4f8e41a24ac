// crates/types/src/agent_error.rs
//! The agent error taxonomy.
//!
//! Errors come from exactly two places: a structured error line on the
//! agent's stdout, or a non-zero exit of the agent subprocess. Free-text
//! matching of conversational content is deliberately not a source.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Classification of a detected agent error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentErrorKind {
    /// Credentials missing, expired, or rejected.
    Auth,
    /// Provider rate limit hit; retry after a backoff.
    RateLimit,
    /// Usage quota or spending cap exhausted.
    Quota,
    /// Connection-level failure talking to the provider.
    Network,
    /// Prompt exceeds the model's context window.
    ContextWindow,
    /// Agent subprocess exited non-zero with no recognized pattern.
    Crashed,
    /// A matched pattern known to be unrecoverable.
    Fatal,
}

/// The offending input, preserved for diagnostics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorRaw {
    /// The stdout line the error was detected on.
    Line(String),
    /// Exit-path detection: the subprocess outcome.
    #[serde(rename_all = "camelCase")]
    Exit {
        exit_code: i32,
        stdout: String,
        stderr: String,
    },
}

/// A modeled agent error, ready for display or a retry decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentError {
    #[serde(rename = "type")]
    pub kind: AgentErrorKind,
    pub message: String,
    pub recoverable: bool,
    pub agent_id: String,
    /// Unix seconds at detection time.
    pub timestamp: i64,
    pub raw: ErrorRaw,
}

impl AgentError {
    /// An error detected on a structured stdout line.
    pub fn from_line(
        kind: AgentErrorKind,
        recoverable: bool,
        message: impl Into<String>,
        agent_id: impl Into<String>,
        line: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable,
            agent_id: agent_id.into(),
            timestamp: chrono::Utc::now().timestamp(),
            raw: ErrorRaw::Line(line.into()),
        }
    }

    /// An error detected from a non-zero subprocess exit.
    pub fn from_exit(
        kind: AgentErrorKind,
        recoverable: bool,
        message: impl Into<String>,
        agent_id: impl Into<String>,
        exit_code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            recoverable,
            agent_id: agent_id.into(),
            timestamp: chrono::Utc::now().timestamp(),
            raw: ErrorRaw::Exit {
                exit_code,
                stdout: stdout.into(),
                stderr: stderr.into(),
            },
        }
    }

    /// Wire form for broadcasting to remote clients.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
