// ── Threat-intel event routes ───────────────────────────────────────────────

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use sidecar_core::models::AnalyzedEvent;
use sidecar_core::repo::events::EventFilter;
use sidecar_core::repo::{EventsRepository, Page, Pagination, SortOrder};

#[derive(Debug, serde::Deserialize)]
pub struct EventsQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub is_threat: Option<bool>,
    pub threat_type: Option<String>,
    pub source: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub sort: Option<String>,
    pub order: Option<String>,
}

pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Page<AnalyzedEvent>>, ApiError> {
    let pagination = Pagination::new(query.page.unwrap_or(1), query.page_size.unwrap_or(20))?;
    let filter = EventFilter {
        is_threat: query.is_threat,
        threat_type: query.threat_type,
        source: query.source,
        start_date: parse_date(query.start_date)?,
        end_date: parse_date(query.end_date)?,
    };
    let sort = query.sort.unwrap_or_else(|| "created_at".to_string());
    let order = SortOrder::parse(&query.order.unwrap_or_else(|| "desc".to_string()))?;
    let page = EventsRepository::new(&state.store).list(&filter, pagination, &sort, order)?;
    Ok(Json(page))
}

pub async fn get(State(state): State<ApiState>, Path(id): Path<String>) -> Result<Json<AnalyzedEvent>, ApiError> {
    let event = EventsRepository::new(&state.store)
        .get(&id)?
        .ok_or_else(|| ApiError::not_found(format!("event '{id}' not found")))?;
    Ok(Json(event))
}

fn parse_date(raw: Option<String>) -> Result<Option<DateTime<Utc>>, ApiError> {
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| ApiError::Validation(format!("invalid date '{s}': {e}")))
    })
    .transpose()
}
