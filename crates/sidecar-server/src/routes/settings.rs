// ── Settings routes ──────────────────────────────────────────────────────────
// Settings updates are pushed to the store, then mirrored back out to the
// config file so the two never drift — same one-way-then-rewrite contract
// `sidecar_config::reconcile` applies on startup in the other direction.

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use sidecar_cloud::{CloudClient, CredentialKey, Vault};
use sidecar_core::models::Settings;
use sidecar_core::repo::{BudgetsRepository, SettingsRepository};
use std::sync::atomic::Ordering;

pub async fn get(State(state): State<ApiState>) -> Result<Json<Settings>, ApiError> {
    Ok(Json(SettingsRepository::new(&state.store).get()?))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateSettingsRequest {
    pub theme: Option<String>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub retention_days: Option<i64>,
    pub store_text_content: Option<bool>,
    pub notifications_enabled: Option<bool>,
    pub launch_on_startup: Option<bool>,
    pub minimize_to_tray: Option<bool>,
    pub window_width: Option<i64>,
    pub window_height: Option<i64>,
    pub window_x: Option<i64>,
    pub window_y: Option<i64>,
    pub block_threats: Option<bool>,
}

pub async fn update(
    State(state): State<ApiState>,
    Json(req): Json<UpdateSettingsRequest>,
) -> Result<Json<Settings>, ApiError> {
    let block_mode = state.block_mode.clone();
    let updated = SettingsRepository::new(&state.store).update(|settings| {
        if let Some(v) = req.theme {
            settings.theme = v;
        }
        if let Some(v) = req.server_host {
            settings.server_host = v;
        }
        if let Some(v) = req.server_port {
            settings.server_port = v;
        }
        if let Some(v) = req.retention_days {
            settings.retention_days = v;
        }
        if let Some(v) = req.store_text_content {
            settings.store_text_content = v;
        }
        if let Some(v) = req.notifications_enabled {
            settings.notifications_enabled = v;
        }
        if let Some(v) = req.launch_on_startup {
            settings.launch_on_startup = v;
        }
        if let Some(v) = req.minimize_to_tray {
            settings.minimize_to_tray = v;
        }
        if req.window_width.is_some() {
            settings.window_width = req.window_width;
        }
        if req.window_height.is_some() {
            settings.window_height = req.window_height;
        }
        if req.window_x.is_some() {
            settings.window_x = req.window_x;
        }
        if req.window_y.is_some() {
            settings.window_y = req.window_y;
        }
        if let Some(v) = req.block_threats {
            settings.block_threats = v;
            block_mode.store(v, Ordering::Relaxed);
        }
    })?;

    rewrite_config_file(&state, &updated);
    Ok(Json(updated))
}

fn rewrite_config_file(state: &ApiState, settings: &Settings) {
    let global_budget = BudgetsRepository::new(&state.store).get("global").ok().flatten();
    let rendered = sidecar_config::render_template(settings, global_budget.as_ref());
    if let Err(err) = sidecar_config::write(&state.config_path, &rendered) {
        log::warn!("[server] failed to rewrite config file: {err}");
    }
}

#[derive(Debug, Deserialize)]
pub struct CloudCredentialsRequest {
    pub base_url: String,
    pub api_key: String,
}

#[derive(Debug, Serialize)]
pub struct CloudCredentialsResponse {
    pub valid: bool,
    pub user_email: Option<String>,
    pub message: Option<String>,
}

pub async fn configure_cloud_credentials(
    State(state): State<ApiState>,
    Json(req): Json<CloudCredentialsRequest>,
) -> Result<Json<CloudCredentialsResponse>, ApiError> {
    let validation = match CloudClient::validate_credentials(&req.base_url, &req.api_key).await {
        Ok(v) => v,
        Err(err) => {
            return Ok(Json(CloudCredentialsResponse {
                valid: false,
                user_email: None,
                message: Some(err.to_string()),
            }))
        }
    };

    if !validation.valid {
        return Ok(Json(CloudCredentialsResponse {
            valid: false,
            user_email: validation.user_email,
            message: Some("credentials rejected by cloud account".to_string()),
        }));
    }

    Vault::set(&CredentialKey::CloudApiKey, &req.api_key)?;
    Vault::set(&CredentialKey::CloudBaseUrl, &req.base_url)?;
    SettingsRepository::new(&state.store).update(|settings| {
        settings.cloud_mode_enabled = true;
        settings.cloud_user_email = validation.user_email.clone();
        settings.cloud_connected_at = Some(chrono::Utc::now());
    })?;

    Ok(Json(CloudCredentialsResponse { valid: true, user_email: validation.user_email, message: None }))
}
