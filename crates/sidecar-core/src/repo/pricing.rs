// ── Pricing repository ───────────────────────────────────────────────────────
// Dollars-per-million-token rates the cost recorder consults. Backed by the
// same table the 5-minute TTL cache refreshes from.

use crate::error::SidecarResult;
use crate::models::PricingEntry;
use crate::store::Store;
use rusqlite::{params, OptionalExtension, Row};

pub struct PricingRepository<'a> {
    store: &'a Store,
}

impl<'a> PricingRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn upsert(&self, entry: &PricingEntry) -> SidecarResult<()> {
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO pricing_entries (provider, model_id, input_per_million, output_per_million)
                 VALUES (?1,?2,?3,?4)
                 ON CONFLICT(provider, model_id) DO UPDATE SET
                    input_per_million=excluded.input_per_million,
                    output_per_million=excluded.output_per_million",
                params![entry.provider, entry.model_id, entry.input_per_million, entry.output_per_million],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, provider: &str, model_id: &str) -> SidecarResult<Option<PricingEntry>> {
        self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT provider, model_id, input_per_million, output_per_million
                     FROM pricing_entries WHERE provider = ?1 AND model_id = ?2",
                    params![provider, model_id],
                    Self::from_row,
                )
                .optional()?)
        })
    }

    /// Suffix-match fallback: the first entry for `provider` whose model id
    /// is a prefix of (or matches) `model_id`, longest match first. Used when
    /// an exact `(provider, model_id)` row isn't present — e.g. a dated
    /// snapshot model id against a base pricing row.
    pub fn find_best_match(&self, provider: &str, model_id: &str) -> SidecarResult<Option<PricingEntry>> {
        if let Some(exact) = self.get(provider, model_id)? {
            return Ok(Some(exact));
        }
        let candidates = self.list_for_provider(provider)?;
        Ok(candidates
            .into_iter()
            .filter(|c| model_id.starts_with(c.model_id.as_str()))
            .max_by_key(|c| c.model_id.len()))
    }

    pub fn list_for_provider(&self, provider: &str) -> SidecarResult<Vec<PricingEntry>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT provider, model_id, input_per_million, output_per_million
                 FROM pricing_entries WHERE provider = ?1",
            )?;
            Ok(stmt
                .query_map(params![provider], Self::from_row)?
                .collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn list_all(&self) -> SidecarResult<Vec<PricingEntry>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT provider, model_id, input_per_million, output_per_million FROM pricing_entries",
            )?;
            Ok(stmt.query_map([], Self::from_row)?.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn delete(&self, provider: &str, model_id: &str) -> SidecarResult<bool> {
        let deleted = self.store.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM pricing_entries WHERE provider = ?1 AND model_id = ?2",
                params![provider, model_id],
            )?)
        })?;
        Ok(deleted > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<PricingEntry> {
        Ok(PricingEntry {
            provider: row.get(0)?,
            model_id: row.get(1)?,
            input_per_million: row.get(2)?,
            output_per_million: row.get(3)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(provider: &str, model_id: &str) -> PricingEntry {
        PricingEntry {
            provider: provider.to_string(),
            model_id: model_id.to_string(),
            input_per_million: 2.5,
            output_per_million: 10.0,
        }
    }

    #[test]
    fn upsert_and_exact_get() {
        let store = Store::open_in_memory().unwrap();
        let repo = PricingRepository::new(&store);
        repo.upsert(&sample("openai", "gpt-4o")).unwrap();
        let fetched = repo.get("openai", "gpt-4o").unwrap().unwrap();
        assert_eq!(fetched.input_per_million, 2.5);
    }

    #[test]
    fn suffix_match_falls_back_to_longest_prefix() {
        let store = Store::open_in_memory().unwrap();
        let repo = PricingRepository::new(&store);
        repo.upsert(&sample("openai", "gpt-4o")).unwrap();
        let matched = repo.find_best_match("openai", "gpt-4o-2024-11-20").unwrap().unwrap();
        assert_eq!(matched.model_id, "gpt-4o");
    }

    #[test]
    fn unknown_model_returns_none() {
        let store = Store::open_in_memory().unwrap();
        let repo = PricingRepository::new(&store);
        assert!(repo.find_best_match("openai", "totally-unknown-model").unwrap().is_none());
    }
}
