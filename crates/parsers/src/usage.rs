// crates/parsers/src/usage.rs
//! Usage aggregation: fold heterogeneous token/cost fields into one record.
//!
//! Claude reports usage three ways, sometimes in the same message: a
//! per-model `modelUsage` breakdown (camelCase keys), a flat `usage` object
//! (snake_case keys), and a `total_cost_usd` scalar. Codex reports one
//! snake_case object on `turn.completed`. Both fold into [`UsageStats`].
//!
//! Semantics differ per agent and matter for context-window math:
//! - Claude cache tokens are *additive* to `input_tokens`
//! - Codex `cached_input_tokens` are a *subset* of `input_tokens`

use agent_deck_types::UsageStats;
use serde_json::Value;

/// First present numeric field among `keys`, as u64.
fn read_u64(value: &Value, keys: &[&str]) -> Option<u64> {
    keys.iter().find_map(|key| value.get(key).and_then(Value::as_u64))
}

/// Fold a Claude flat `usage` object (snake_case keys) into `stats`.
fn fold_flat_usage(stats: &mut UsageStats, usage: &Value) {
    stats.input_tokens += read_u64(usage, &["input_tokens"]).unwrap_or(0);
    stats.output_tokens += read_u64(usage, &["output_tokens"]).unwrap_or(0);
    stats.cache_read_tokens += read_u64(usage, &["cache_read_input_tokens"]).unwrap_or(0);
    stats.cache_creation_tokens += read_u64(usage, &["cache_creation_input_tokens"]).unwrap_or(0);
}

/// Fold a Claude `modelUsage` breakdown (map of model name to camelCase
/// usage) into `stats`. Token counts sum across models; the context window
/// is the largest one observed.
fn fold_model_usage(stats: &mut UsageStats, model_usage: &Value) {
    let Some(models) = model_usage.as_object() else {
        return;
    };
    for per_model in models.values() {
        stats.input_tokens += read_u64(per_model, &["inputTokens"]).unwrap_or(0);
        stats.output_tokens += read_u64(per_model, &["outputTokens"]).unwrap_or(0);
        stats.cache_read_tokens += read_u64(per_model, &["cacheReadInputTokens"]).unwrap_or(0);
        stats.cache_creation_tokens +=
            read_u64(per_model, &["cacheCreationInputTokens"]).unwrap_or(0);
        if let Some(window) = read_u64(per_model, &["contextWindow"]) {
            stats.context_window = stats.context_window.max(window);
        }
        if let Some(cost) = per_model.get("costUSD").and_then(Value::as_f64) {
            *stats.cost_usd.get_or_insert(0.0) += cost;
        }
    }
}

/// Reconcile every usage shape a Claude message can carry into one record.
///
/// Precedence: a `modelUsage` breakdown is authoritative when present (it
/// already spans the whole turn); otherwise the flat `usage` object — at the
/// top level or nested under `message` — is used. A `total_cost_usd` scalar
/// overrides any per-model cost sum. Returns `None` when the message carries
/// no usage at all.
pub fn claude_usage(raw: &Value) -> Option<UsageStats> {
    let mut stats = UsageStats::default();

    if let Some(model_usage) = raw.get("modelUsage") {
        fold_model_usage(&mut stats, model_usage);
    } else if let Some(usage) = raw.get("usage") {
        fold_flat_usage(&mut stats, usage);
    } else if let Some(usage) = raw.get("message").and_then(|m| m.get("usage")) {
        fold_flat_usage(&mut stats, usage);
    }

    if let Some(cost) = raw.get("total_cost_usd").and_then(Value::as_f64) {
        stats.cost_usd = Some(cost);
    }

    if stats.is_empty() {
        None
    } else {
        Some(stats)
    }
}

/// Fold a Codex `turn.completed` usage object.
///
/// `output_tokens` in the result is output plus reasoning, with the
/// reasoning component re-exposed separately. `cached_input_tokens` are a
/// subset of `input_tokens`, so callers computing context fill must use
/// input + output only.
pub fn codex_turn_usage(usage: &Value, context_window: u64) -> Option<UsageStats> {
    let input = read_u64(usage, &["input_tokens"]);
    let output = read_u64(usage, &["output_tokens"]);
    let cached = read_u64(usage, &["cached_input_tokens"]);
    let reasoning = read_u64(usage, &["reasoning_output_tokens"]);

    if input.is_none() && output.is_none() && cached.is_none() && reasoning.is_none() {
        return None;
    }

    Some(UsageStats {
        input_tokens: input.unwrap_or(0),
        output_tokens: output.unwrap_or(0) + reasoning.unwrap_or(0),
        cache_read_tokens: cached.unwrap_or(0),
        cache_creation_tokens: 0,
        context_window,
        cost_usd: None,
        reasoning_tokens: reasoning,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_claude_flat_usage() {
        let raw = json!({
            "usage": {
                "input_tokens": 100,
                "output_tokens": 40,
                "cache_read_input_tokens": 900,
                "cache_creation_input_tokens": 50,
            }
        });
        let stats = claude_usage(&raw).unwrap();
        assert_eq!(stats.input_tokens, 100);
        assert_eq!(stats.output_tokens, 40);
        assert_eq!(stats.cache_read_tokens, 900);
        assert_eq!(stats.cache_creation_tokens, 50);
        assert_eq!(stats.cost_usd, None);
    }

    #[test]
    fn test_claude_model_usage_breakdown() {
        let raw = json!({
            "modelUsage": {
                "claude-sonnet-4-5": {
                    "inputTokens": 10, "outputTokens": 20,
                    "cacheReadInputTokens": 30, "cacheCreationInputTokens": 5,
                    "costUSD": 0.12, "contextWindow": 200000,
                },
                "claude-haiku-4-5": {
                    "inputTokens": 1, "outputTokens": 2,
                    "costUSD": 0.01, "contextWindow": 200000,
                },
            }
        });
        let stats = claude_usage(&raw).unwrap();
        assert_eq!(stats.input_tokens, 11);
        assert_eq!(stats.output_tokens, 22);
        assert_eq!(stats.context_window, 200000);
        assert!((stats.cost_usd.unwrap() - 0.13).abs() < 1e-9);
    }

    #[test]
    fn test_claude_total_cost_overrides_breakdown_sum() {
        let raw = json!({
            "modelUsage": {
                "claude-sonnet-4-5": { "inputTokens": 10, "costUSD": 0.12 },
            },
            "total_cost_usd": 0.5,
        });
        let stats = claude_usage(&raw).unwrap();
        assert_eq!(stats.cost_usd, Some(0.5));
    }

    #[test]
    fn test_claude_nested_message_usage() {
        let raw = json!({
            "message": { "usage": { "input_tokens": 7, "output_tokens": 3 } }
        });
        let stats = claude_usage(&raw).unwrap();
        assert_eq!(stats.input_tokens, 7);
    }

    #[test]
    fn test_claude_no_usage_returns_none() {
        assert_eq!(claude_usage(&json!({"type": "assistant"})), None);
    }

    #[test]
    fn test_codex_reasoning_folds_into_output() {
        let usage = json!({
            "input_tokens": 10,
            "output_tokens": 5,
            "reasoning_output_tokens": 3,
        });
        let stats = codex_turn_usage(&usage, 272000).unwrap();
        assert_eq!(stats.output_tokens, 8);
        assert_eq!(stats.reasoning_tokens, Some(3));
        assert_eq!(stats.context_window, 272000);
    }

    #[test]
    fn test_codex_cached_subset_not_added_to_input() {
        let usage = json!({
            "input_tokens": 1000,
            "cached_input_tokens": 800,
            "output_tokens": 50,
        });
        let stats = codex_turn_usage(&usage, 272000).unwrap();
        // cached is a subset: input stays 1000, not 1800
        assert_eq!(stats.input_tokens, 1000);
        assert_eq!(stats.cache_read_tokens, 800);
    }

    #[test]
    fn test_codex_empty_usage_returns_none() {
        assert_eq!(codex_turn_usage(&json!({}), 272000), None);
    }
}
