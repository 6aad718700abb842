// ── Budgets repository ───────────────────────────────────────────────────────
// Daily spend caps, one row per scope. "global" is a reserved scope name
// meaning all agents combined; any other scope is an agent id.

use crate::error::SidecarResult;
use crate::models::{Budget, BudgetAction};
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};

pub struct BudgetsRepository<'a> {
    store: &'a Store,
}

impl<'a> BudgetsRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn upsert(&self, scope: &str, daily_limit: Option<f64>, action: BudgetAction) -> SidecarResult<Budget> {
        let now = Utc::now();
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO budgets (scope, daily_limit, action, updated_at)
                 VALUES (?1,?2,?3,?4)
                 ON CONFLICT(scope) DO UPDATE SET
                    daily_limit=excluded.daily_limit, action=excluded.action, updated_at=excluded.updated_at",
                params![scope, daily_limit, action.as_str(), now.to_rfc3339()],
            )?;
            Ok(())
        })?;
        Ok(Budget {
            scope: scope.to_string(),
            daily_limit,
            action,
            updated_at: now,
        })
    }

    pub fn get(&self, scope: &str) -> SidecarResult<Option<Budget>> {
        self.store.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT scope, daily_limit, action, updated_at FROM budgets WHERE scope = ?1",
                    params![scope],
                    Self::from_row,
                )
                .optional()?)
        })
    }

    pub fn list_all(&self) -> SidecarResult<Vec<Budget>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT scope, daily_limit, action, updated_at FROM budgets ORDER BY scope")?;
            Ok(stmt.query_map([], Self::from_row)?.collect::<Result<Vec<_>, _>>()?)
        })
    }

    pub fn delete(&self, scope: &str) -> SidecarResult<bool> {
        let deleted = self
            .store
            .with_conn(|conn| Ok(conn.execute("DELETE FROM budgets WHERE scope = ?1", params![scope])?))?;
        Ok(deleted > 0)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Budget> {
        let action_str: String = row.get(2)?;
        let updated_at: String = row.get(3)?;
        Ok(Budget {
            scope: row.get(0)?,
            daily_limit: row.get(1)?,
            action: BudgetAction::parse(&action_str).unwrap_or(BudgetAction::Warn),
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
        let repo = BudgetsRepository::new(&store);
        repo.upsert("global", Some(50.0), BudgetAction::Block).unwrap();
        let fetched = repo.get("global").unwrap().unwrap();
        assert_eq!(fetched.daily_limit, Some(50.0));
        assert_eq!(fetched.action, BudgetAction::Block);

        assert!(repo.delete("global").unwrap());
        assert!(repo.get("global").unwrap().is_none());
    }

    #[test]
    fn null_daily_limit_means_unlimited() {
        let store = Store::open_in_memory().unwrap();
        let repo = BudgetsRepository::new(&store);
        repo.upsert("agent-a", None, BudgetAction::Warn).unwrap();
        let fetched = repo.get("agent-a").unwrap().unwrap();
        assert!(fetched.daily_limit.is_none());
    }
}
