// crates/parsers/src/registry.rs
//! Registry mapping an agent identifier to its parser adapter.
//!
//! An explicit, constructible object owned by the process manager — not
//! ambient process-wide state. `get` fails soft with `None` so callers can
//! surface "unsupported agent" instead of crashing.

use std::collections::HashMap;
use std::sync::Arc;

use crate::claude::ClaudeOutputParser;
use crate::codex::CodexOutputParser;
use crate::AgentOutputParser;

#[derive(Default)]
pub struct ParserRegistry {
    parsers: HashMap<String, Arc<dyn AgentOutputParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with both built-in adapters registered.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(ClaudeOutputParser::new()));
        registry.register(Arc::new(CodexOutputParser::new()));
        registry
    }

    /// Register an adapter under its own `agent_id`. Registering the same id
    /// twice overwrites — the last registration wins.
    pub fn register(&mut self, parser: Arc<dyn AgentOutputParser>) {
        self.parsers.insert(parser.agent_id().to_string(), parser);
    }

    /// `None` for unknown ids rather than panicking.
    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn AgentOutputParser>> {
        self.parsers.get(agent_id).cloned()
    }

    pub fn agent_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.parsers.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Full reset, for test isolation.
    pub fn clear(&mut self) {
        self.parsers.clear();
    }
}
