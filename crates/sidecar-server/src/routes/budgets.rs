// ── Budget routes ────────────────────────────────────────────────────────────

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use sidecar_core::models::{Budget, BudgetAction};
use sidecar_core::repo::BudgetsRepository;
use sidecar_core::SidecarError;

pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<Budget>>, ApiError> {
    Ok(Json(BudgetsRepository::new(&state.store).list_all()?))
}

#[derive(Debug, Deserialize)]
pub struct UpsertBudgetRequest {
    pub scope: String,
    pub daily_limit: Option<f64>,
    pub action: BudgetAction,
}

pub async fn upsert(State(state): State<ApiState>, Json(req): Json<UpsertBudgetRequest>) -> Result<Json<Budget>, ApiError> {
    if let Some(limit) = req.daily_limit {
        if limit < 0.0 {
            return Err(SidecarError::validation("daily_limit must not be negative").into());
        }
    }
    let budget = BudgetsRepository::new(&state.store).upsert(&req.scope, req.daily_limit, req.action)?;
    Ok(Json(budget))
}
