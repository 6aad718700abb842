// ── Cost records repository ─────────────────────────────────────────────────
// Persists one row per completed upstream call's token accounting, and
// answers the budget guardian's "how much has this scope spent today" query.

use super::{Page, Pagination, SortOrder};
use crate::error::{SidecarError, SidecarResult};
use crate::models::CostRecord;
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

const SORTABLE_COLUMNS: &[&str] = &["created_at", "total_cost_usd", "agent_id", "provider"];

#[derive(Debug, Default, Clone)]
pub struct CostFilter {
    pub agent_id: Option<String>,
    pub provider: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

pub struct CostsRepository<'a> {
    store: &'a Store,
}

impl<'a> CostsRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn insert(&self, record: &CostRecord) -> SidecarResult<()> {
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO cost_records (
                    id, agent_id, provider, model_id, input_tokens, output_tokens,
                    input_cached_tokens, input_cost_usd, output_cost_usd, total_cost_usd,
                    rate_input, rate_output, pricing_known, request_id, created_at
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15)",
                params![
                    record.id,
                    record.agent_id,
                    record.provider,
                    record.model_id,
                    record.input_tokens,
                    record.output_tokens,
                    record.input_cached_tokens,
                    record.input_cost_usd,
                    record.output_cost_usd,
                    record.total_cost_usd,
                    record.rate_input,
                    record.rate_output,
                    record.pricing_known,
                    record.request_id,
                    record.created_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })
    }

    pub fn list(
        &self,
        filter: &CostFilter,
        pagination: Pagination,
        sort: &str,
        order: SortOrder,
    ) -> SidecarResult<Page<CostRecord>> {
        if !SORTABLE_COLUMNS.contains(&sort) {
            return Err(SidecarError::validation(format!(
                "cannot sort by non-indexed column '{sort}'"
            )));
        }
        let (where_sql, bind) = Self::build_where(filter);
        self.store.with_conn(|conn| {
            let total: i64 = conn.query_row(
                &format!("SELECT COUNT(*) FROM cost_records {where_sql}"),
                rusqlite::params_from_iter(bind.iter()),
                |r| r.get(0),
            )?;

            let list_sql = format!(
                "{} {where_sql} ORDER BY {sort} {} LIMIT ?{} OFFSET ?{}",
                Self::select_sql(),
                order.as_sql(),
                bind.len() + 1,
                bind.len() + 2,
            );
            let mut stmt = conn.prepare(&list_sql)?;
            let mut all_params: Vec<&dyn rusqlite::ToSql> =
                bind.iter().map(|b| b as &dyn rusqlite::ToSql).collect();
            all_params.push(&pagination.page_size);
            all_params.push(&pagination.offset());
            let items = stmt
                .query_map(all_params.as_slice(), Self::from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Page::new(items, total, pagination))
        })
    }

    /// Sum of `total_cost_usd` for `scope` (an agent id, or the literal
    /// string `"global"` meaning all agents) since the start of the local
    /// day represented by `day_start` (caller passes a UTC instant already
    /// aligned to local midnight — the budget guardian owns that math).
    pub fn spent_since(&self, scope: &str, day_start: DateTime<Utc>) -> SidecarResult<f64> {
        self.store.with_conn(|conn| {
            let total: Option<f64> = if scope == "global" {
                conn.query_row(
                    "SELECT SUM(total_cost_usd) FROM cost_records WHERE created_at >= ?1",
                    params![day_start.to_rfc3339()],
                    |r| r.get(0),
                )?
            } else {
                conn.query_row(
                    "SELECT SUM(total_cost_usd) FROM cost_records WHERE agent_id = ?1 AND created_at >= ?2",
                    params![scope, day_start.to_rfc3339()],
                    |r| r.get(0),
                )?
            };
            Ok(total.unwrap_or(0.0))
        })
    }

    fn build_where(filter: &CostFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut clauses = Vec::new();
        let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(agent_id) = &filter.agent_id {
            clauses.push("agent_id = ?".to_string());
            bind.push(Box::new(agent_id.clone()));
        }
        if let Some(provider) = &filter.provider {
            clauses.push("provider = ?".to_string());
            bind.push(Box::new(provider.clone()));
        }
        if let Some(start) = filter.start_date {
            clauses.push("created_at >= ?".to_string());
            bind.push(Box::new(start.to_rfc3339()));
        }
        if let Some(end) = filter.end_date {
            clauses.push("created_at <= ?".to_string());
            bind.push(Box::new(end.to_rfc3339()));
        }

        let mut sql = String::new();
        for (i, clause) in clauses.iter().enumerate() {
            let placeholder = format!("?{}", i + 1);
            sql.push_str(if i == 0 { "WHERE " } else { " AND " });
            sql.push_str(&clause.replace('?', &placeholder));
        }
        (sql, bind)
    }

    fn select_sql() -> &'static str {
        "SELECT id, agent_id, provider, model_id, input_tokens, output_tokens, input_cached_tokens,
                input_cost_usd, output_cost_usd, total_cost_usd, rate_input, rate_output,
                pricing_known, request_id, created_at
         FROM cost_records"
    }

    fn from_row(row: &Row) -> rusqlite::Result<CostRecord> {
        let created_at: String = row.get(14)?;
        Ok(CostRecord {
            id: row.get(0)?,
            agent_id: row.get(1)?,
            provider: row.get(2)?,
            model_id: row.get(3)?,
            input_tokens: row.get(4)?,
            output_tokens: row.get(5)?,
            input_cached_tokens: row.get(6)?,
            input_cost_usd: row.get(7)?,
            output_cost_usd: row.get(8)?,
            total_cost_usd: row.get(9)?,
            rate_input: row.get(10)?,
            rate_output: row.get(11)?,
            pricing_known: row.get(12)?,
            request_id: row.get(13)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample(agent_id: &str, cost: f64) -> CostRecord {
        CostRecord {
            id: Uuid::new_v4().to_string(),
            agent_id: agent_id.to_string(),
            provider: "openai".into(),
            model_id: "gpt-4o".into(),
            input_tokens: 100,
            output_tokens: 50,
            input_cached_tokens: 0,
            input_cost_usd: cost / 2.0,
            output_cost_usd: cost / 2.0,
            total_cost_usd: cost,
            rate_input: Some(2.5),
            rate_output: Some(10.0),
            pricing_known: true,
            request_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn spent_since_sums_scope_only() {
        let store = Store::open_in_memory().unwrap();
        let repo = CostsRepository::new(&store);
        repo.insert(&sample("agent-a", 1.5)).unwrap();
        repo.insert(&sample("agent-b", 2.0)).unwrap();

        let day_start = Utc::now() - chrono::Duration::hours(1);
        assert_eq!(repo.spent_since("agent-a", day_start).unwrap(), 1.5);
        assert_eq!(repo.spent_since("global", day_start).unwrap(), 3.5);
    }

    #[test]
    fn list_rejects_unsortable_column() {
        let store = Store::open_in_memory().unwrap();
        let repo = CostsRepository::new(&store);
        let result = repo.list(&CostFilter::default(), Pagination::new(1, 20).unwrap(), "model_id", SortOrder::Asc);
        assert!(result.is_err());
    }
}
