// crates/parsers/src/patterns.rs
//! Error pattern matching: classify raw error text into the taxonomy.
//!
//! Rules are applied only to text that is already known to be an error — a
//! structured error message or the stderr/stdout of a failed exit. They are
//! never run against conversational model output.

use agent_deck_types::AgentErrorKind;
use regex_lite::Regex;

/// One classification rule.
pub struct ErrorRule {
    pub kind: AgentErrorKind,
    pub recoverable: bool,
    matcher: Matcher,
}

enum Matcher {
    /// Case-insensitive substring match.
    Substring(&'static str),
    Regex(Regex),
}

impl ErrorRule {
    fn substring(kind: AgentErrorKind, recoverable: bool, needle: &'static str) -> Self {
        Self {
            kind,
            recoverable,
            matcher: Matcher::Substring(needle),
        }
    }

    fn regex(kind: AgentErrorKind, recoverable: bool, pattern: &str) -> Self {
        Self {
            kind,
            recoverable,
            // Patterns are compile-time constants; a bad one is a programmer
            // error caught by the pattern-table tests.
            matcher: Matcher::Regex(Regex::new(pattern).expect("valid error pattern")),
        }
    }

    fn matches(&self, haystack_lower: &str) -> bool {
        match &self.matcher {
            Matcher::Substring(needle) => haystack_lower.contains(needle),
            Matcher::Regex(re) => re.is_match(haystack_lower),
        }
    }
}

/// An ordered rule table for one agent. First match wins.
pub struct PatternSet {
    rules: Vec<ErrorRule>,
}

impl PatternSet {
    pub fn new(rules: Vec<ErrorRule>) -> Self {
        Self { rules }
    }

    /// Classify error text. Returns the first matching rule.
    pub fn classify(&self, text: &str) -> Option<&ErrorRule> {
        let haystack = text.to_lowercase();
        self.rules.iter().find(|rule| rule.matches(&haystack))
    }
}

/// Rule table for Claude Code stderr/error messages.
pub fn claude_patterns() -> PatternSet {
    use AgentErrorKind::*;
    PatternSet::new(vec![
        ErrorRule::substring(Auth, true, "invalid api key"),
        ErrorRule::substring(Auth, true, "authentication_error"),
        ErrorRule::substring(Auth, true, "please run /login"),
        ErrorRule::substring(RateLimit, true, "rate limit"),
        ErrorRule::substring(RateLimit, true, "rate_limit_error"),
        ErrorRule::substring(RateLimit, true, "overloaded_error"),
        ErrorRule::substring(Quota, false, "credit balance is too low"),
        ErrorRule::substring(Quota, false, "usage limit reached"),
        ErrorRule::substring(ContextWindow, false, "prompt is too long"),
        ErrorRule::substring(ContextWindow, false, "context window"),
        ErrorRule::regex(Network, true, r"econn(refused|reset)|enotfound|etimedout"),
        ErrorRule::substring(Network, true, "fetch failed"),
    ])
}

/// Rule table for Codex CLI stderr/error messages.
pub fn codex_patterns() -> PatternSet {
    use AgentErrorKind::*;
    PatternSet::new(vec![
        ErrorRule::substring(Auth, true, "not logged in"),
        ErrorRule::substring(Auth, true, "401 unauthorized"),
        ErrorRule::substring(Auth, true, "run codex login"),
        ErrorRule::substring(RateLimit, true, "rate limit"),
        ErrorRule::substring(Quota, false, "usage limit"),
        ErrorRule::substring(ContextWindow, false, "context window"),
        ErrorRule::substring(Network, true, "stream disconnected"),
        ErrorRule::regex(Network, true, r"connection (refused|reset|closed)"),
    ])
}
