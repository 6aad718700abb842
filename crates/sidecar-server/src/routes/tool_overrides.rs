// ── Tool permission override routes ─────────────────────────────────────────

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use sidecar_core::models::{Action, ToolOverride};
use sidecar_core::repo::ToolOverridesRepository;

pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<ToolOverride>>, ApiError> {
    Ok(Json(ToolOverridesRepository::new(&state.store).list_all()?))
}

#[derive(Debug, Deserialize)]
pub struct UpsertToolOverrideRequest {
    pub tool_id: String,
    pub action: Action,
    pub rate_limit_max_calls: Option<i64>,
    pub rate_limit_window_seconds: Option<i64>,
}

pub async fn upsert(
    State(state): State<ApiState>,
    Json(req): Json<UpsertToolOverrideRequest>,
) -> Result<Json<ToolOverride>, ApiError> {
    let row = ToolOverridesRepository::new(&state.store).upsert(
        &req.tool_id,
        req.action,
        req.rate_limit_max_calls,
        req.rate_limit_window_seconds,
    )?;
    Ok(Json(row))
}

pub async fn delete(State(state): State<ApiState>, Path(tool_id): Path<String>) -> Result<StatusCode, ApiError> {
    let deleted = ToolOverridesRepository::new(&state.store).delete(&tool_id)?;
    if !deleted {
        return Err(ApiError::not_found(format!("override for tool '{tool_id}' not found")));
    }
    Ok(StatusCode::NO_CONTENT)
}
