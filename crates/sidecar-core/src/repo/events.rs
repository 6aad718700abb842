// ── Events repository ────────────────────────────────────────────────────────
// Persists analyzed events (threat intel) and answers the paginated,
// filterable, sortable queries the HTTP server exposes.

use super::{Page, Pagination, SortOrder};
use crate::error::{SidecarError, SidecarResult};
use crate::models::{AnalyzedEvent, EventReview, MatchedRule};
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use std::collections::HashMap;

/// Columns callers may sort by. Anything else is rejected — the spec
/// requires the sort field to be an indexed column.
const SORTABLE_COLUMNS: &[&str] = &[
    "created_at",
    "risk_score",
    "confidence",
    "processing_time_ms",
    "threat_type",
];

#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub is_threat: Option<bool>,
    pub threat_type: Option<String>,
    pub source: Option<String>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

pub struct EventsRepository<'a> {
    store: &'a Store,
}

impl<'a> EventsRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn insert(&self, event: &AnalyzedEvent) -> SidecarResult<()> {
        let matched_rules = serde_json::to_string(&event.matched_rules)?;
        let metadata = serde_json::to_string(&event.metadata)?;
        self.store.with_conn(|conn| {
            conn.execute(
                "INSERT INTO threat_intel_records (
                    id, request_id, text_content, text_hash, text_length,
                    is_threat, threat_type, risk_score, confidence, matched_rules,
                    source_identifier, session_id, processing_time_ms, created_at,
                    metadata, llm_reviewed, llm_agrees, llm_confidence,
                    llm_explanation, llm_risk_adjustment, llm_model_used
                ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
                params![
                    event.id,
                    event.request_id,
                    event.text_content,
                    event.text_hash,
                    event.text_length,
                    event.is_threat,
                    event.threat_type,
                    event.risk_score,
                    event.confidence,
                    matched_rules,
                    event.source_identifier,
                    event.session_id,
                    event.processing_time_ms,
                    event.created_at.to_rfc3339(),
                    metadata,
                    event.review.is_some(),
                    event.review.as_ref().map(|r| r.agrees),
                    event.review.as_ref().map(|r| r.confidence),
                    event.review.as_ref().and_then(|r| r.explanation.clone()),
                    event.review.as_ref().map(|r| r.risk_adjustment),
                    event.review.as_ref().and_then(|r| r.model_used.clone()),
                ],
            )?;
            Ok(())
        })
    }

    pub fn get(&self, id: &str) -> SidecarResult<Option<AnalyzedEvent>> {
        self.store.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!("{} WHERE id = ?1", Self::select_sql()))?;
            let mut rows = stmt.query(params![id])?;
            match rows.next()? {
                Some(row) => Ok(Some(Self::from_row(row)?)),
                None => Ok(None),
            }
        })
    }

    pub fn list(
        &self,
        filter: &EventFilter,
        pagination: Pagination,
        sort: &str,
        order: SortOrder,
    ) -> SidecarResult<Page<AnalyzedEvent>> {
        if !SORTABLE_COLUMNS.contains(&sort) {
            return Err(SidecarError::validation(format!(
                "cannot sort by non-indexed column '{sort}'"
            )));
        }

        let (where_sql, bind) = Self::build_where(filter);

        self.store.with_conn(|conn| {
            let count_sql = format!("SELECT COUNT(*) FROM threat_intel_records {where_sql}");
            let total: i64 = conn.query_row(
                &count_sql,
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

    fn build_where(filter: &EventFilter) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut clauses = Vec::new();
        let mut bind: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(is_threat) = filter.is_threat {
            clauses.push("is_threat = ?".to_string());
            bind.push(Box::new(is_threat));
        }
        if let Some(tt) = &filter.threat_type {
            clauses.push("threat_type = ?".to_string());
            bind.push(Box::new(tt.clone()));
        }
        if let Some(source) = &filter.source {
            clauses.push("source_identifier = ?".to_string());
            bind.push(Box::new(source.clone()));
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
        "SELECT id, request_id, text_content, text_hash, text_length, is_threat, threat_type,
                risk_score, confidence, matched_rules, source_identifier, session_id,
                processing_time_ms, created_at, metadata, llm_reviewed, llm_agrees,
                llm_confidence, llm_explanation, llm_risk_adjustment, llm_model_used
         FROM threat_intel_records"
    }

    fn from_row(row: &Row) -> rusqlite::Result<AnalyzedEvent> {
        let matched_rules_json: String = row.get(9)?;
        let matched_rules: Vec<MatchedRule> =
            serde_json::from_str(&matched_rules_json).unwrap_or_default();
        let metadata_json: Option<String> = row.get(14)?;
        let metadata: HashMap<String, serde_json::Value> = metadata_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        let created_at: String = row.get(13)?;
        let llm_reviewed: bool = row.get(15)?;
        let review = if llm_reviewed {
            Some(EventReview {
                agrees: row.get::<_, Option<bool>>(16)?.unwrap_or(true),
                confidence: row.get::<_, Option<f64>>(17)?.unwrap_or(0.0),
                explanation: row.get(18)?,
                risk_adjustment: row.get::<_, Option<i64>>(19)?.unwrap_or(0),
                model_used: row.get(20)?,
            })
        } else {
            None
        };

        Ok(AnalyzedEvent {
            id: row.get(0)?,
            request_id: row.get(1)?,
            text_content: row.get(2)?,
            text_hash: row.get(3)?,
            text_length: row.get(4)?,
            is_threat: row.get(5)?,
            threat_type: row.get(6)?,
            risk_score: row.get(7)?,
            confidence: row.get(8)?,
            matched_rules,
            source_identifier: row.get(10)?,
            session_id: row.get(11)?,
            processing_time_ms: row.get(12)?,
            created_at: DateTime::parse_from_rfc3339(&created_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
            metadata,
            review,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_event(is_threat: bool, risk: i64) -> AnalyzedEvent {
        AnalyzedEvent {
            id: Uuid::new_v4().to_string(),
            request_id: None,
            text_content: Some("hello".into()),
            text_hash: "abc".into(),
            text_length: 5,
            is_threat,
            threat_type: if is_threat { Some("prompt_injection".into()) } else { None },
            risk_score: risk,
            confidence: 0.8,
            matched_rules: vec![],
            source_identifier: Some("agent-a".into()),
            session_id: None,
            processing_time_ms: 1,
            created_at: Utc::now(),
            metadata: HashMap::new(),
            review: None,
        }
    }

    #[test]
    fn insert_and_get_roundtrip() {
        let store = Store::open_in_memory().unwrap();
        let repo = EventsRepository::new(&store);
        let event = sample_event(true, 80);
        repo.insert(&event).unwrap();
        let fetched = repo.get(&event.id).unwrap().unwrap();
        assert_eq!(fetched.id, event.id);
        assert_eq!(fetched.risk_score, 80);
        assert!(fetched.is_threat);
    }

    #[test]
    fn list_filters_by_threat_flag() {
        let store = Store::open_in_memory().unwrap();
        let repo = EventsRepository::new(&store);
        repo.insert(&sample_event(true, 90)).unwrap();
        repo.insert(&sample_event(false, 0)).unwrap();

        let page = repo
            .list(
                &EventFilter { is_threat: Some(true), ..Default::default() },
                Pagination::new(1, 20).unwrap(),
                "created_at",
                SortOrder::Desc,
            )
            .unwrap();
        assert_eq!(page.total, 1);
        assert!(page.items[0].is_threat);
    }

    #[test]
    fn rejects_non_indexed_sort_column() {
        let store = Store::open_in_memory().unwrap();
        let repo = EventsRepository::new(&store);
        let result = repo.list(
            &EventFilter::default(),
            Pagination::new(1, 20).unwrap(),
            "text_content",
            SortOrder::Asc,
        );
        assert!(result.is_err());
    }
}
