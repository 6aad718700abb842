// ── Tool overrides repository ───────────────────────────────────────────────
// User-set actions (and optional rate limits) for essential or custom tools,
// keyed by tool id. Consulted by the permission engine ahead of the bundled
// registry's default action.

use crate::error::SidecarResult;
use crate::models::{Action, ToolOverride};
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

pub struct ToolOverridesRepository<'a> {
    store: &'a Store,
}

impl<'a> ToolOverridesRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn upsert(
        &self,
        tool_id: &str,
        action: Action,
        rate_limit_max_calls: Option<i64>,
        rate_limit_window_seconds: Option<i64>,
    ) -> SidecarResult<ToolOverride> {
        let now = Utc::now();
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO essential_tool_overrides (tool_id, action, rate_limit_max_calls, rate_limit_window_seconds, updated_at)
                 VALUES (?1,?2,?3,?4,?5)
                 ON CONFLICT(tool_id) DO UPDATE SET
                    action=excluded.action, rate_limit_max_calls=excluded.rate_limit_max_calls,
                    rate_limit_window_seconds=excluded.rate_limit_window_seconds, updated_at=excluded.updated_at",
                params![tool_id, action.as_str(), rate_limit_max_calls, rate_limit_window_seconds, now.to_rfc3339()],
            )?;
            Ok(())
        })?;
        Ok(ToolOverride {
            tool_id: tool_id.to_string(),
            action,
            rate_limit_max_calls,
            rate_limit_window_seconds,
            updated_at: now,
        })
    }

    pub fn get(&self, tool_id: &str) -> SidecarResult<Option<ToolOverride>> {
        self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT tool_id, action, rate_limit_max_calls, rate_limit_window_seconds, updated_at
                     FROM essential_tool_overrides WHERE tool_id = ?1",
                    params![tool_id],
                    Self::from_row,
                )
                .optional()?)
        })
    }

    /// All overrides, as a map for O(1) lookup during permission evaluation.
    pub fn list_all(&self) -> SidecarResult<Vec<ToolOverride>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT tool_id, action, rate_limit_max_calls, rate_limit_window_seconds, updated_at
                 FROM essential_tool_overrides",
            )?;
            Ok(stmt.query_map([], Self::from_row)?.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn delete(&self, tool_id: &str) -> SidecarResult<bool> {
        let deleted = self
            .store
            .with_conn(|conn| Ok(conn.execute("DELETE FROM essential_tool_overrides WHERE tool_id = ?1", params![tool_id])?))?;
        Ok(deleted > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<ToolOverride> {
        let action_str: String = row.get(1)?;
        let updated_at: String = row.get(4)?;
        Ok(ToolOverride {
            tool_id: row.get(0)?,
            action: Action::parse(&action_str).unwrap_or(Action::LogOnly),
            rate_limit_max_calls: row.get(2)?,
            rate_limit_window_seconds: row.get(3)?,
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upsert_get_delete_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let repo = ToolOverridesRepository::new(&store);
        repo.upsert("gmail.send_email", Action::Block, Some(5), Some(60)).unwrap();

        let fetched = repo.get("gmail.send_email").unwrap().unwrap();
        assert_eq!(fetched.action, Action::Block);
        assert_eq!(fetched.rate_limit_max_calls, Some(5));

        assert!(repo.delete("gmail.send_email").unwrap());
        assert!(repo.get("gmail.send_email").unwrap().is_none());
    }
}
