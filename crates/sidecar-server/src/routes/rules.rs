// ── Rule routes ──────────────────────────────────────────────────────────────
// Custom-rule CRUD, plus read-only views over the community cache and the
// merged counts the dashboard shows. Rule changes trigger an analyzer reload
// so the next `/analyze` call sees them immediately.

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use sidecar_core::models::{CommunityRuleCacheEntry, Rule, Severity};
use sidecar_core::repo::rules::RuleCounts;
use sidecar_core::repo::{CommunityRulesRepository, RulesRepository};
use sidecar_tools::registry;
use std::collections::HashMap;

pub async fn list(State(state): State<ApiState>) -> Result<Json<Vec<Rule>>, ApiError> {
    Ok(Json(RulesRepository::new(&state.store).list_custom_rules()?))
}

pub async fn list_community(State(state): State<ApiState>) -> Result<Json<Vec<CommunityRuleCacheEntry>>, ApiError> {
    Ok(Json(CommunityRulesRepository::new(&state.store).list_all()?))
}

pub async fn counts(State(state): State<ApiState>) -> Result<Json<RuleCounts>, ApiError> {
    Ok(Json(RulesRepository::new(&state.store).rule_counts()?))
}

#[derive(Debug, Deserialize)]
pub struct CreateRuleRequest {
    pub name: String,
    pub category: String,
    pub description: String,
    pub severity: Severity,
    pub patterns: Vec<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

fn default_enabled() -> bool {
    true
}

pub async fn create(State(state): State<ApiState>, Json(req): Json<CreateRuleRequest>) -> Result<Json<Rule>, ApiError> {
    let rule = RulesRepository::new(&state.store).create_custom_rule(
        &req.name,
        &req.category,
        &req.description,
        req.severity,
        &req.patterns,
        req.enabled,
        &req.metadata,
    )?;
    state.analyzer.reload()?;
    Ok(Json(rule))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateRuleRequest {
    pub name: Option<String>,
    pub category: Option<String>,
    pub description: Option<String>,
    pub severity: Option<Severity>,
    pub patterns: Option<Vec<String>>,
    pub enabled: Option<bool>,
    pub metadata: Option<HashMap<String, serde_json::Value>>,
}

pub async fn update(
    State(state): State<ApiState>,
    Path(id): Path<String>,
    Json(req): Json<UpdateRuleRequest>,
) -> Result<Json<Rule>, ApiError> {
    let updated = RulesRepository::new(&state.store)
        .update_custom_rule(
            &id,
            req.name.as_deref(),
            req.category.as_deref(),
            req.description.as_deref(),
            req.severity,
            req.patterns.as_deref(),
            req.enabled,
            req.metadata.as_ref(),
        )?
        .ok_or_else(|| ApiError::not_found(format!("rule '{id}' not found")))?;
    state.analyzer.reload()?;
    Ok(Json(updated))
}

pub async fn delete(State(state): State<ApiState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let deleted = RulesRepository::new(&state.store).delete_custom_rule(&id)?;
    if !deleted {
        return Err(ApiError::not_found(format!("rule '{id}' not found")));
    }
    state.analyzer.reload()?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct GenerateRuleRequest {
    pub description: String,
}

pub async fn generate(Json(req): Json<GenerateRuleRequest>) -> Json<sidecar_analyzer::GeneratedRule> {
    Json(sidecar_analyzer::generate_from_description(&req.description))
}

#[derive(Debug, Serialize)]
pub struct EssentialToolEntry {
    pub id: String,
    pub label: String,
    pub risk: String,
    pub default_action: String,
}

pub async fn list_essential_tools() -> Json<Vec<EssentialToolEntry>> {
    let entries = registry::ESSENTIAL_TOOLS
        .iter()
        .map(|t| EssentialToolEntry {
            id: t.id.clone(),
            label: t.label.clone(),
            risk: t.risk.as_str().to_string(),
            default_action: t.default_action.as_str().to_string(),
        })
        .collect();
    Json(entries)
}
