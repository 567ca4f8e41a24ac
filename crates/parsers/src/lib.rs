// crates/parsers/src/lib.rs
//! Protocol normalization for agent CLI stdout streams.
//!
//! Each supported agent emits a bespoke JSON-Lines protocol on stdout. The
//! adapters in this crate turn those streams into the canonical
//! [`ParsedEvent`] model so everything downstream (session reducer, broadcast
//! bridge) is agent-agnostic.
//!
//! Contract, binding for every adapter:
//! - blank/whitespace-only input parses to `None`, never an error
//! - input that is not valid JSON degrades to a `Text` event carrying the
//!   line verbatim — an adapter method never panics and never returns `Err`
//! - error detection reads structured fields only; conversational content is
//!   never pattern-matched (an agent *discussing* "timeout" is not an error)

pub mod claude;
pub mod codex;
pub mod patterns;
pub mod registry;
pub mod usage;

pub use claude::ClaudeOutputParser;
pub use codex::{CodexConfig, CodexOutputParser};
pub use registry::ParserRegistry;

use agent_deck_types::{AgentError, ParsedEvent, UsageStats};

/// Common parsing capability implemented per agent wire format.
///
/// Implementations are stateless across calls except for parser-local,
/// read-once configuration (e.g. Codex's context-window resolution at
/// construction time).
pub trait AgentOutputParser: Send + Sync {
    /// Stable identifier for the agent this adapter understands.
    fn agent_id(&self) -> &str;

    /// Parse one stdout line into at most one canonical event.
    fn parse_json_line(&self, line: &str) -> Option<ParsedEvent>;

    /// Whether this event is the authoritative final response for a turn.
    fn is_result_message(&self, event: &ParsedEvent) -> bool;

    /// The agent's continuity id carried by this event, if any.
    fn extract_session_id(&self, event: &ParsedEvent) -> Option<String>;

    /// Usage folded out of this event's raw payload, if any.
    fn extract_usage(&self, event: &ParsedEvent) -> Option<UsageStats>;

    /// Discoverable slash commands, for agents that advertise them.
    fn extract_slash_commands(&self, event: &ParsedEvent) -> Option<Vec<String>>;

    /// Detect a structured error on a stdout line.
    fn detect_error_from_line(&self, line: &str) -> Option<AgentError>;

    /// Classify a subprocess exit. Exit code 0 is never an error; a non-zero
    /// exit with no recognized pattern falls back to a generic crash
    /// classification — it is never silently swallowed.
    fn detect_error_from_exit(
        &self,
        exit_code: i32,
        stderr: &str,
        stdout: &str,
    ) -> Option<AgentError>;
}
