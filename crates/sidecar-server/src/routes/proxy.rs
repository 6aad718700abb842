// ── Proxy control routes ─────────────────────────────────────────────────────
// Starts/stops the multi-provider proxy on `server_port + 1`, matching the
// convention the config template's `proxy.port` section already encodes.

use crate::error::ApiError;
use crate::proxy_control::ProxyStatus;
use crate::state::ApiState;
use axum::extract::State;
use axum::Json;
use sidecar_core::repo::SettingsRepository;
use sidecar_proxy::ProxyState;
use std::sync::atomic::Ordering;

pub async fn status(State(state): State<ApiState>) -> Json<ProxyStatus> {
    Json(state.proxy.status())
}

pub async fn start(State(state): State<ApiState>) -> Result<Json<ProxyStatus>, ApiError> {
    let settings = SettingsRepository::new(&state.store).get()?;
    let proxy_state = ProxyState::new(
        state.store.clone(),
        state.analyzer.clone(),
        state.cost_recorder.clone(),
        state.block_mode.load(Ordering::Relaxed),
    );
    let status = state.proxy.start(&settings.server_host, settings.server_port + 1, proxy_state).await?;
    Ok(Json(status))
}

pub async fn stop(State(state): State<ApiState>) -> Result<Json<ProxyStatus>, ApiError> {
    let status = state.proxy.stop().await?;
    Ok(Json(status))
}
