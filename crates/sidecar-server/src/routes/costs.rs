// ── Cost record routes ───────────────────────────────────────────────────────

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::{Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use sidecar_core::models::CostRecord;
use sidecar_core::repo::costs::CostFilter;
use sidecar_core::repo::{CostsRepository, Page, Pagination, SortOrder};

#[derive(Debug, serde::Deserialize)]
pub struct CostsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub agent: Option<String>,
    pub provider: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<CostsQuery>,
) -> Result<Json<Page<CostRecord>>, ApiError> {
    let pagination = Pagination::new(query.page.unwrap_or(1), query.page_size.unwrap_or(20))?;
    let filter = CostFilter {
        agent_id: query.agent,
        provider: query.provider,
        start_date: parse_date(query.start_date)?,
        end_date: parse_date(query.end_date)?,
    };
    let sort = query.sort.unwrap_or_else(|| "created_at".to_string());
    let order = SortOrder::parse(&query.order.unwrap_or_else(|| "desc".to_string()))?;
    let page = CostsRepository::new(&state.store).list(&filter, pagination, &sort, order)?;
    Ok(Json(page))
}

fn parse_date(raw: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ApiError::Validation(format!("invalid date '{s}': {e}")))
    })
    .transpose()
}
