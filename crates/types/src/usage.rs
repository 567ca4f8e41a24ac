// crates/types/src/usage.rs
//! Token and cost accounting, normalized across agents.

use serde::{Deserialize, Serialize};

/// One numeric usage record folded from an agent's heterogeneous token/cost
/// fields.
///
/// `output_tokens` is inclusive of any reasoning tokens; `reasoning_tokens`
/// re-exposes that component separately for UI display. `cost_usd` is omitted
/// (not zero) when the agent does not report pricing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageStats {
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cache_read_tokens: u64,
    pub cache_creation_tokens: u64,
    /// Size of the model's context window, for fill-percentage display.
    pub context_window: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u64>,
}

impl UsageStats {
    /// True when no token field carries a value — such records are not worth
    /// broadcasting.
    pub fn is_empty(&self) -> bool {
        self.input_tokens == 0
            && self.output_tokens == 0
            && self.cache_read_tokens == 0
            && self.cache_creation_tokens == 0
            && self.cost_usd.is_none()
    }
}
