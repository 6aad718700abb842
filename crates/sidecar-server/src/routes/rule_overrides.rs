// ── Rule override routes ────────────────────────────────────────────────────
// Per-rule severity/enabled/pattern overrides layered on top of a community
// rule. Deliberately a separate surface from `/api/overrides`, which the
// store treats as an unrelated table for tool permission overrides.

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sidecar_core::models::{RuleOverride, Severity};
use sidecar_core::repo::OverridesRepository;

pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<RuleOverride>>, ApiError> {
    Ok(Json(OverridesRepository::new(&state.store).list_all()?))
}

#[derive(Debug, Deserialize)]
pub struct UpsertRuleOverrideRequest {
    pub enabled: Option<bool>,
    pub severity: Option<Severity>,
    pub patterns: Option<Vec<String>>,
}

pub async fn upsert(
    State(state): State<ApiState>,
    Path(rule_id): Path<String>,
    Json(req): Json<UpsertRuleOverrideRequest>,
) -> Result<Json<RuleOverride>, ApiError> {
    let override_row =
        OverridesRepository::new(&state.store).upsert(&rule_id, req.enabled, req.severity, req.patterns.as_deref())?;
    state.analyzer.reload()?;
    Ok(Json(override_row))
}

pub async fn delete(State(state): State<ApiState>, Path(rule_id): Path<String>) -> Result<StatusCode, ApiError> {
    let deleted = OverridesRepository::new(&state.store).delete(&rule_id)?;
    if !deleted {
        return Err(ApiError::not_found(format!("override for rule '{rule_id}' not found")));
    }
    state.analyzer.reload()?;
    Ok(StatusCode::NO_CONTENT)
}
