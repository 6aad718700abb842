// ── Rules repository ─────────────────────────────────────────────────────────
// CRUD for user-authored custom rules, plus the merged "enabled rules" view
// the analyzer compiles from: community cache rows (minus override-disabled)
// plus enabled custom rules, with override severity/patterns applied.

use crate::error::{SidecarError, SidecarResult};
use crate::models::{Rule, RuleSource, Severity};
use crate::store::Store;
use chrono::{DateTime, Utc};
use regex::Regex;
use rusqlite::{params, OptionalExtension, Row};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct RuleCounts {
    pub community: i64,
    pub custom: i64,
}

pub struct RulesRepository<'a> {
    store: &'a Store,
}

impl<'a> RulesRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn create_custom_rule(
        &self,
        name: &str,
        category: &str,
        description: &str,
        severity: Severity,
        patterns: &[String],
        enabled: bool,
        metadata: &HashMap<String, serde_json::Value>,
    ) -> SidecarResult<Rule> {
        validate_patterns(patterns)?;
        let now = Utc::now();
        let rule = Rule {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            category: category.to_string(),
            description: description.to_string(),
            severity,
            patterns: patterns.to_vec(),
            enabled,
            source: RuleSource::Custom,
            source_file: None,
            metadata: metadata.clone(),
            created_at: now,
            updated_at: now,
        };
        let patterns_json = serde_json::to_string(&rule.patterns)?;
        let metadata_json = serde_json::to_string(&rule.metadata)?;
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO custom_rules (id, name, category, description, severity, patterns, enabled, metadata, created_at, updated_at)
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10)",
                params![
                    rule.id, rule.name, rule.category, rule.description, rule.severity.as_str(),
                    patterns_json, rule.enabled, metadata_json,
                    rule.created_at.to_rfc3339(), rule.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;
        Ok(rule)
    }

    pub fn update_custom_rule(
        &self,
        rule_id: &str,
        name: Option<&str>,
        category: Option<&str>,
        description: Option<&str>,
        severity: Option<Severity>,
        patterns: Option<&[String]>,
        enabled: Option<bool>,
        metadata: Option<&HashMap<String, serde_json::Value>>,
    ) -> SidecarResult<Option<Rule>> {
        if let Some(p) = patterns {
            validate_patterns(p)?;
        }
        let Some(mut rule) = self.get_custom_rule(rule_id)? else {
            return Ok(None);
        };
        if let Some(v) = name {
            rule.name = v.to_string();
        }
        if let Some(v) = category {
            rule.category = v.to_string();
        }
        if let Some(v) = description {
            rule.description = v.to_string();
        }
        if let Some(v) = severity {
            rule.severity = v;
        }
        if let Some(v) = patterns {
            rule.patterns = v.to_vec();
        }
        if let Some(v) = enabled {
            rule.enabled = v;
        }
        if let Some(v) = metadata {
            rule.metadata = v.clone();
        }
        rule.updated_at = Utc::now();

        let patterns_json = serde_json::to_string(&rule.patterns)?;
        let metadata_json = serde_json::to_string(&rule.metadata)?;
        self.store.with_conn(|conn| {
            conn.execute(
                "UPDATE custom_rules SET name=?1, category=?2, description=?3, severity=?4,
                 patterns=?5, enabled=?6, metadata=?7, updated_at=?8 WHERE id=?9",
                params![
                    rule.name, rule.category, rule.description, rule.severity.as_str(),
                    patterns_json, rule.enabled, metadata_json, rule.updated_at.to_rfc3339(), rule_id,
                ],
            )?;
            Ok(())
        })?;
        Ok(Some(rule))
    }

    pub fn delete_custom_rule(&self, rule_id: &str) -> SidecarResult<bool> {
        let deleted = self
            .store
            .with_conn(|conn| Ok(conn.execute("DELETE FROM custom_rules WHERE id = ?1", params![rule_id])?))?;
        Ok(deleted > 0)
    }

    pub fn get_custom_rule(&self, rule_id: &str) -> SidecarResult<Option<Rule>> {
        self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, name, category, description, severity, patterns, enabled, metadata, created_at, updated_at
                     FROM custom_rules WHERE id = ?1",
                    params![rule_id],
                    Self::from_custom_row,
                )
                .optional()?)
        })
    }

    pub fn list_custom_rules(&self) -> SidecarResult<Vec<Rule>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, category, description, severity, patterns, enabled, metadata, created_at, updated_at
                 FROM custom_rules ORDER BY created_at DESC",
            )?;
            Ok(stmt.query_map([], Self::from_custom_row)?.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn rule_counts(&self) -> SidecarResult<RuleCounts> {
        self.store.with_conn(|conn| {
            let community: i64 = conn.query_row("SELECT COUNT(*) FROM community_rules", [], |r| r.get(0))?;
            let custom: i64 = conn.query_row("SELECT COUNT(*) FROM custom_rules", [], |r| r.get(0))?;
            Ok(RuleCounts { community, custom })
        })
    }

    /// The analyzer's enabled-rule view: community rules (cache rows) minus
    /// override-disabled, plus enabled custom rules — with override severity
    /// and override patterns already applied. This is what gets compiled
    /// into the matcher.
    pub fn get_all_enabled_rules(&self) -> SidecarResult<Vec<Rule>> {
        self.store.with_conn(|conn| {
            let mut out = Vec::new();

            let mut comm_stmt = conn.prepare(
                "SELECT c.id, c.name, c.category, c.description, c.severity, c.patterns,
                        c.enabled, c.source_file, c.metadata,
                        o.enabled, o.severity, o.patterns
                 FROM community_rules c
                 LEFT JOIN rule_overrides o ON o.original_rule_id = c.id",
            )?;
            let comm_rows = comm_stmt.query_map([], |row: &Row| {
                let base_enabled: bool = row.get(6)?;
                let override_enabled: Option<bool> = row.get(9)?;
                let enabled = override_enabled.unwrap_or(base_enabled);

                let severity_str: String = row.get(4)?;
                let override_severity: Option<String> = row.get(10)?;
                let severity = override_severity
                    .as_deref()
                    .and_then(Severity::parse)
                    .unwrap_or_else(|| Severity::parse(&severity_str).unwrap_or(Severity::Medium));

                let patterns_json: String = row.get(5)?;
                let override_patterns_json: Option<String> = row.get(11)?;
                let patterns: Vec<String> = override_patterns_json
                    .as_deref()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_else(|| serde_json::from_str(&patterns_json).unwrap_or_default());

                let metadata_json: Option<String> = row.get(8)?;
                let metadata: HashMap<String, serde_json::Value> = metadata_json
                    .as_deref()
                    .and_then(|s| serde_json::from_str(s).ok())
                    .unwrap_or_default();

                Ok(Rule {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    category: row.get(2)?,
                    description: row.get(3)?,
                    severity,
                    patterns,
                    enabled,
                    source: RuleSource::Community,
                    source_file: row.get(7)?,
                    metadata,
                    created_at: Utc::now(),
                    updated_at: Utc::now(),
                })
            })?;
            for row in comm_rows {
                let rule = row?;
                if rule.enabled {
                    out.push(rule);
                }
            }

            let mut custom_stmt = conn.prepare(
                "SELECT id, name, category, description, severity, patterns, enabled, metadata, created_at, updated_at
                 FROM custom_rules WHERE enabled = 1",
            )?;
            let custom_rows = custom_stmt
                .query_map([], Self::from_custom_row)?
                .collect::<Result<Vec<_>, _>>()?;
            out.extend(custom_rows);

            Ok(out)
        })
    }

    fn from_custom_row(row: &Row) -> rusqlite::Result<Rule> {
        let severity_str: String = row.get(4)?;
        let patterns_json: String = row.get(5)?;
        let patterns: Vec<String> = serde_json::from_str(&patterns_json).unwrap_or_default();
        let metadata_json: Option<String> = row.get(7)?;
        let metadata: HashMap<String, serde_json::Value> = metadata_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        let created_at: String = row.get(8)?;
        let updated_at: String = row.get(9)?;
        Ok(Rule {
            id: row.get(0)?,
            name: row.get(1)?,
            category: row.get(2)?,
            description: row.get(3)?,
            severity: Severity::parse(&severity_str).unwrap_or(Severity::Medium),
            patterns,
            enabled: row.get(6)?,
            source: RuleSource::Custom,
            source_file: None,
            metadata,
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

/// Validates that every pattern compiles as a regex. Unlike the analyzer's
/// compile-and-skip-bad-patterns behavior (which never blocks *loading*),
/// custom rules created through the API are rejected outright on an invalid
/// pattern — the caller gets immediate feedback instead of a silently
/// inert rule.
pub fn validate_patterns(patterns: &[String]) -> SidecarResult<()> {
    for pattern in patterns {
        Regex::new(pattern)
            .map_err(|e| SidecarError::validation(format!("invalid regex '{pattern}': {e}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_rejects_invalid_regex() {
        let store = Store::open_in_memory().unwrap();
        let repo = RulesRepository::new(&store);
        let result = repo.create_custom_rule(
            "bad",
            "test",
            "desc",
            Severity::Low,
            &["(unclosed".to_string()],
            true,
            &HashMap::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn create_update_delete_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let repo = RulesRepository::new(&store);
        let rule = repo
            .create_custom_rule("r1", "test", "desc", Severity::High, &["foo".to_string()], true, &HashMap::new())
            .unwrap();
        assert_eq!(rule.source, RuleSource::Custom);

        let updated = repo
            .update_custom_rule(&rule.id, None, None, None, Some(Severity::Critical), None, Some(false), None)
            .unwrap()
            .unwrap();
        assert_eq!(updated.severity, Severity::Critical);
        assert!(!updated.enabled);

        assert!(repo.delete_custom_rule(&rule.id).unwrap());
        assert!(repo.get_custom_rule(&rule.id).unwrap().is_none());
    }
}
