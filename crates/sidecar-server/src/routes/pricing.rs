// ── Pricing routes ───────────────────────────────────────────────────────────

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::{Query, State};
use axum::Json;
use serde::Deserialize;
use sidecar_core::models::PricingEntry;
use sidecar_core::repo::PricingRepository;
use sidecar_core::SidecarError;

#[derive(Debug, Deserialize)]
pub struct PricingQuery {
    pub provider: Option<String>,
}

pub async fn list(
    State(state): State<ApiState>,
    Query(query): Query<PricingQuery>,
) -> Result<Json<Vec<PricingEntry>>, ApiError> {
    let repo = PricingRepository::new(&state.store);
    let entries = match query.provider {
        Some(provider) => repo.list_for_provider(&provider)?,
        None => repo.list_all()?,
    };
    Ok(Json(entries))
}

pub async fn upsert(State(state): State<ApiState>, Json(entry): Json<PricingEntry>) -> Result<Json<PricingEntry>, ApiError> {
    if entry.input_per_million < 0.0 || entry.output_per_million < 0.0 {
        return Err(SidecarError::validation("pricing rates must not be negative").into());
    }
    PricingRepository::new(&state.store).upsert(&entry)?;
    Ok(Json(entry))
}
