// ── Cost recorder ────────────────────────────────────────────────────────────
// Turns a raw provider response body into a persisted CostRecord. Never
// surfaces an error to its caller — a proxy response must go out regardless
// of whether its cost could be priced or even persisted, so every failure
// here is logged and swallowed.

use crate::normalize::canonicalize;
use crate::pricing_cache::PricingCache;
use crate::tokens::{self, TokenUsage};
use serde_json::Value;
use sidecar_core::models::CostRecord;
use sidecar_core::repo::CostsRepository;
use sidecar_core::Store;
use std::sync::Arc;
use uuid::Uuid;

/// Cache-discount factor applied to cached input tokens, by provider family.
/// Providers outside these families get no discount (`1.0`) — the cached
/// tokens are billed at the full input rate.
fn cache_discount(provider: &str) -> f64 {
    match provider {
        "openai" | "azure" | "groq" | "openrouter" | "deepseek" | "mistral" | "together"
        | "fireworks" | "perplexity" | "xai" | "moonshot" | "minimax" | "cerebras" => 0.5,
        "anthropic" => 0.1,
        "gemini" => 0.25,
        _ => 1.0,
    }
}

pub struct CostRecorder {
    store: Arc<Store>,
    pricing: PricingCache,
}

impl CostRecorder {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, pricing: PricingCache::new() }
    }

    /// Extracts token usage from `response_body`, prices it against
    /// `provider`/`raw_model_id`, and persists a [`CostRecord`]. Any failure
    /// along the way (no usage field, no pricing row, store error) is logged
    /// at `warn` and swallowed — this never propagates to the caller.
    pub fn record(&self, agent_id: &str, provider: &str, raw_model_id: &str, request_id: Option<&str>, response_body: &Value) {
        let Some(usage) = tokens::extract(response_body) else {
            log::debug!("no token usage found in response body for provider={provider} model={raw_model_id}");
            return;
        };

        let canonical_model = canonicalize(raw_model_id);
        let pricing = match self.pricing.get(&self.store, provider, &canonical_model) {
            Ok(p) => p,
            Err(err) => {
                log::warn!("pricing lookup failed for {provider}/{canonical_model}: {err}");
                None
            }
        };

        let record = Self::build_record(agent_id, provider, raw_model_id, request_id, usage, pricing.as_ref().map(|p| (p.input_per_million, p.output_per_million)));

        if let Err(err) = CostsRepository::new(&self.store).insert(&record) {
            log::warn!("failed to persist cost record for agent={agent_id}: {err}");
        }
    }

    fn build_record(
        agent_id: &str,
        provider: &str,
        model_id: &str,
        request_id: Option<&str>,
        usage: TokenUsage,
        rates: Option<(f64, f64)>,
    ) -> CostRecord {
        let billable_input = (usage.input_tokens - usage.cached_input_tokens).max(0);

        let (input_cost_usd, output_cost_usd, rate_input, rate_output, pricing_known) = match rates {
            Some((rate_in, rate_out)) => {
                let discount = cache_discount(provider);
                let input_cost = (billable_input as f64 / 1_000_000.0) * rate_in
                    + (usage.cached_input_tokens as f64 / 1_000_000.0) * rate_in * discount;
                let output_cost = (usage.output_tokens as f64 / 1_000_000.0) * rate_out;
                (round8(input_cost), round8(output_cost), Some(rate_in), Some(rate_out), true)
            }
            None => (0.0, 0.0, None, None, false),
        };

        CostRecord {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            input_tokens: usage.input_tokens,
            output_tokens: usage.output_tokens,
            input_cached_tokens: usage.cached_input_tokens,
            input_cost_usd,
            output_cost_usd,
            total_cost_usd: round8(input_cost_usd + output_cost_usd),
            rate_input,
            rate_output,
            pricing_known,
            request_id: request_id.map(|s| s.to_string()),
            created_at: chrono::Utc::now(),
        }
    }
}

fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sidecar_core::repo::PricingRepository;

    fn priced_store() -> Arc<Store> {
        let store = Arc::new(Store::open_in_memory().unwrap());
        PricingRepository::new(&store)
            .upsert(&sidecar_core::models::PricingEntry {
                provider: "openai".into(),
                model_id: "gpt-4o".into(),
                input_per_million: 2.5,
                output_per_million: 10.0,
            })
            .unwrap();
        store
    }

    #[test]
    fn records_priced_cost_with_cache_discount() {
        let store = priced_store();
        let recorder = CostRecorder::new(store.clone());
        let body = json!({"usage": {"prompt_tokens": 1000, "completion_tokens": 500, "prompt_tokens_details": {"cached_tokens": 200}}});
        recorder.record("agent-1", "openai", "gpt-4o", Some("req-1"), &body);

        let records = CostsRepository::new(&store)
            .list(&Default::default(), sidecar_core::repo::Pagination::new(1, 20).unwrap(), "created_at", sidecar_core::repo::SortOrder::Desc)
            .unwrap();
        assert_eq!(records.items.len(), 1);
        let record = &records.items[0];
        assert!(record.pricing_known);
        // billable input = 1000 - 200 = 800; discount for openai = 0.5
        let expected_input = (800.0 / 1_000_000.0) * 2.5 + (200.0 / 1_000_000.0) * 2.5 * 0.5;
        let expected_output = (500.0 / 1_000_000.0) * 10.0;
        assert!((record.input_cost_usd - round8(expected_input)).abs() < 1e-9);
        assert!((record.output_cost_usd - round8(expected_output)).abs() < 1e-9);
    }

    #[test]
    fn unpriced_model_still_persists_zero_cost_record() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let recorder = CostRecorder::new(store.clone());
        let body = json!({"usage": {"prompt_tokens": 10, "completion_tokens": 5}});
        recorder.record("agent-1", "unknown-provider", "mystery-model", None, &body);

        let records = CostsRepository::new(&store)
            .list(&Default::default(), sidecar_core::repo::Pagination::new(1, 20).unwrap(), "created_at", sidecar_core::repo::SortOrder::Desc)
            .unwrap();
        assert_eq!(records.items.len(), 1);
        assert!(!records.items[0].pricing_known);
        assert_eq!(records.items[0].total_cost_usd, 0.0);
    }

    #[test]
    fn missing_usage_field_records_nothing() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let recorder = CostRecorder::new(store.clone());
        recorder.record("agent-1", "openai", "gpt-4o", None, &json!({"choices": []}));

        let records = CostsRepository::new(&store)
            .list(&Default::default(), sidecar_core::repo::Pagination::new(1, 20).unwrap(), "created_at", sidecar_core::repo::SortOrder::Desc)
            .unwrap();
        assert!(records.items.is_empty());
    }
}
