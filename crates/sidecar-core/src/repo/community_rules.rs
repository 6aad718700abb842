// ── Community rules cache repository ────────────────────────────────────────
// The rule loader's staging table: raw bundled-rule-file rows, populated on
// first run. Distinct from `rules::Rule`, which is the analyzer's post-merge
// view (community cache + custom rules + overrides applied).

use crate::error::SidecarResult;
use crate::models::{CommunityRuleCacheEntry, Severity};
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;

pub struct CommunityRulesRepository<'a> {
    store: &'a Store,
}

impl<'a> CommunityRulesRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn count(&self) -> SidecarResult<i64> {
        self.store
            .with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM community_rules", [], |r| r.get(0))?))
    }

    pub fn upsert(&self, entry: &CommunityRuleCacheEntry) -> SidecarResult<()> {
        let patterns = serde_json::to_string(&entry.patterns)?;
        let metadata = serde_json::to_string(&entry.metadata)?;
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO community_rules (id, name, category, description, severity, patterns, enabled, source_file, metadata, loaded_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)
                 ON CONFLICT(id) DO UPDATE SET
                    name=excluded.name, category=excluded.category, description=excluded.description,
                    severity=excluded.severity, patterns=excluded.patterns, source_file=excluded.source_file,
                    metadata=excluded.metadata, loaded_at=excluded.loaded_at",
                params![
                    entry.rule_id,
                    entry.name,
                    entry.category,
                    entry.description,
                    entry.severity.as_str(),
                    patterns,
                    entry.enabled,
                    entry.source_file,
                    metadata,
                    entry.loaded_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list_all(&self) -> SidecarResult<Vec<CommunityRuleCacheEntry>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, category, description, severity, patterns, enabled, source_file, metadata, loaded_at
                 FROM community_rules ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], Self::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get(&self, rule_id: &str) -> SidecarResult<Option<CommunityRuleCacheEntry>> {
        self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, category, description, severity, patterns, enabled, source_file, metadata, loaded_at
                     FROM community_rules WHERE id = ?1",
                    params![rule_id],
                    Self::from_row,
                )
                .optional()?)
        })
    }

    fn from_row(row: &Row) -> rusqlite::Result<CommunityRuleCacheEntry> {
        let patterns_json: String = row.get(5)?;
        let patterns: Vec<String> = serde_json::from_str(&patterns_json).unwrap_or_default();
        let metadata_json: Option<String> = row.get(8)?;
        let metadata: HashMap<String, serde_json::Value> = metadata_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        let severity_str: String = row.get(4)?;
        let loaded_at: String = row.get(9)?;
        Ok(CommunityRuleCacheEntry {
            rule_id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            description: row.get(3)?,
            severity: Severity::parse(&severity_str).unwrap_or(Severity::Medium),
            patterns,
            enabled: row.get(6)?,
            source_file: row.get(7)?,
            metadata,
            loaded_at: DateTime::parse_from_rfc3339(&loaded_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}
