// ── Rule overrides repository ───────────────────────────────────────────────
// User modifications layered over a single community rule. One row per
// original rule id — enforced by a UNIQUE constraint, not just convention.

use crate::error::SidecarResult;
use crate::models::{RuleOverride, Severity};
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use uuid::Uuid;

pub struct OverridesRepository<'a> {
    store: &'a Store,
}

impl<'a> OverridesRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    /// Creates or replaces the override for `original_rule_id`. Only the
    /// fields passed as `Some` are set; the others stay `NULL` (meaning
    /// "defer to the community rule's own value").
    pub fn upsert(
        &self,
        original_rule_id: &str,
        enabled: Option<bool>,
        severity: Option<Severity>,
        patterns: Option<&[String]>,
    ) -> SidecarResult<RuleOverride> {
        let now = Utc::now();
        let patterns_json = patterns.map(serde_json::to_string).transpose()?;
        let severity_str = severity.map(|s| s.as_str());

        let existing_id: Option<String> = self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id FROM rule_overrides WHERE original_rule_id = ?1",
                    params![original_rule_id],
                    |row| row.get(0),
                )
                .optional()?)
        })?;

        let id = existing_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO rule_overrides (id, original_rule_id, enabled, severity, patterns, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7)
                 ON CONFLICT(original_rule_id) DO UPDATE SET
                    enabled=excluded.enabled, severity=excluded.severity,
                    patterns=excluded.patterns, updated_at=excluded.updated_at",
                params![id, original_rule_id, enabled, severity_str, patterns_json, now.to_rfc3339(), now.to_rfc3339()],
            )?;
            Ok(())
        })?;

        Ok(RuleOverride {
            id,
            original_rule_id: original_rule_id.to_string(),
            enabled,
            severity,
            patterns: patterns.map(|p| p.to_vec()),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn get(&self, original_rule_id: &str) -> SidecarResult<Option<RuleOverride>> {
        self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, original_rule_id, enabled, severity, patterns, created_at, updated_at
                     FROM rule_overrides WHERE original_rule_id = ?1",
                    params![original_rule_id],
                    Self::from_row,
                )
                .optional()?)
        })
    }

    pub fn list_all(&self) -> SidecarResult<Vec<RuleOverride>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, original_rule_id, enabled, severity, patterns, created_at, updated_at
                 FROM rule_overrides ORDER BY updated_at DESC",
            )?;
            Ok(stmt.query_map([], Self::from_row)?.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn delete(&self, original_rule_id: &str) -> SidecarResult<bool> {
        let deleted = self.store.with_conn(|conn| {
            Ok(conn.execute(
                "DELETE FROM rule_overrides WHERE original_rule_id = ?1",
                params![original_rule_id],
            )?)
        })?;
        Ok(deleted > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<RuleOverride> {
        let severity_str: Option<String> = row.get(3)?;
        let patterns_json: Option<String> = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        Ok(RuleOverride {
            id: row.get(0)?,
            original_rule_id: row.get(1)?,
            enabled: row.get(2)?,
            severity: severity_str.as_deref().and_then(Severity::parse),
            patterns: patterns_json
                .as_deref()
                .and_then(|s| serde_json::from_str(s).ok()),
            created_at: parse_dt(&created_at),
            updated_at: parse_dt(&updated_at),
        })
    }
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_is_idempotent_per_rule() {
        let store = Store::open_in_memory().unwrap();
        let repo = OverridesRepository::new(&store);
        repo.upsert("rule-1", Some(false), None, None).unwrap();
        repo.upsert("rule-1", Some(true), Some(Severity::Critical), None).unwrap();

        let all = repo.list_all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].enabled, Some(true));
        assert_eq!(all[0].severity, Some(Severity::Critical));
    }

    #[test]
    fn delete_removes_override() {
        let store = Store::open_in_memory().unwrap();
        let repo = OverridesRepository::new(&store);
        repo.upsert("rule-1", Some(false), None, None).unwrap();
        assert!(repo.delete("rule-1").unwrap());
        assert!(repo.get("rule-1").unwrap().is_none());
    }
}
