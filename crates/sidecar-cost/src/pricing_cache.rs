// ── Pricing cache ─────────────────────────────────────────────────────────────
// A short-TTL read-mostly cache in front of the pricing repository, keyed
// `"{provider}/{canonical_model}"`. A miss triggers a repository fetch; if
// the exact row is absent, a secondary scan matches any pricing row whose
// key ends in `/{canonical_model}` — some providers re-host a model under a
// bare name a different provider also uses.

use parking_lot::Mutex;
use sidecar_core::models::PricingEntry;
use sidecar_core::repo::PricingRepository;
use sidecar_core::{SidecarResult, Store};
use std::collections::HashMap;
use std::time::{Duration, Instant};

const TTL: Duration = Duration::from_secs(5 * 60);

struct CacheEntry {
    pricing: Option<PricingEntry>,
    fetched_at: Instant,
}

pub struct PricingCache {
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl Default for PricingCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PricingCache {
    pub fn new() -> Self {
        Self { entries: Mutex::new(HashMap::new()) }
    }

    /// Looks up pricing for `provider`/`canonical_model`, consulting the
    /// cache first and falling back to the store on a miss or stale entry.
    /// Returns `None` only when no row matches even after the suffix scan.
    pub fn get(&self, store: &Store, provider: &str, canonical_model: &str) -> SidecarResult<Option<PricingEntry>> {
        let key = format!("{provider}/{canonical_model}");

        {
            let entries = self.entries.lock();
            if let Some(entry) = entries.get(&key) {
                if entry.fetched_at.elapsed() < TTL {
                    return Ok(entry.pricing.clone());
                }
            }
        }

        let repo = PricingRepository::new(store);
        let mut found = repo.get(provider, canonical_model)?;

        if found.is_none() {
            let suffix = format!("/{canonical_model}");
            found = repo
                .list_all()?
                .into_iter()
                .find(|p| format!("{}/{}", p.provider, p.model_id).ends_with(&suffix));
        }

        self.entries.lock().insert(key, CacheEntry { pricing: found.clone(), fetched_at: Instant::now() });
        Ok(found)
    }

    /// Drops every cached entry, forcing the next lookup to hit the store.
    pub fn force_refresh(&self) {
        self.entries.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(provider: &str, model_id: &str) -> PricingEntry {
        PricingEntry {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            input_per_million: 3.0,
            output_per_million: 15.0,
        }
    }

    #[test]
    fn exact_hit_after_store_fetch() {
        let store = Store::open_in_memory().unwrap();
        PricingRepository::new(&store).upsert(&sample("anthropic", "claude-3-5-sonnet")).unwrap();
        let cache = PricingCache::new();
        let found = cache.get(&store, "anthropic", "claude-3-5-sonnet").unwrap().unwrap();
        assert_eq!(found.input_per_million, 3.0);
    }

    #[test]
    fn cross_provider_suffix_scan_fallback() {
        let store = Store::open_in_memory().unwrap();
        PricingRepository::new(&store).upsert(&sample("openrouter", "openai/gpt-4o")).unwrap();
        let cache = PricingCache::new();
        let found = cache.get(&store, "azure", "gpt-4o").unwrap();
        assert!(found.is_some());
    }

    #[test]
    fn unknown_model_returns_none_not_error() {
        let store = Store::open_in_memory().unwrap();
        let cache = PricingCache::new();
        assert!(cache.get(&store, "openai", "no-such-model").unwrap().is_none());
    }

    #[test]
    fn force_refresh_clears_cached_entries() {
        let store = Store::open_in_memory().unwrap();
        let cache = PricingCache::new();
        cache.get(&store, "openai", "gpt-4o").unwrap();
        cache.force_refresh();
        PricingRepository::new(&store).upsert(&sample("openai", "gpt-4o")).unwrap();
        let found = cache.get(&store, "openai", "gpt-4o").unwrap();
        assert!(found.is_some());
    }
}
