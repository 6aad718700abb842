// ── Analysis routes ──────────────────────────────────────────────────────────
// `/analyze` is local-only. `/api/threat-analytics/` mirrors the cloud
// analyzer's request/response shape and transparently falls back to the
// local analyzer whenever cloud mode is off, uncredentialed, or unreachable.

use crate::error::ApiError;
use crate::state::ApiState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use sidecar_analyzer::AnalysisResult;
use sidecar_cloud::{CloudClient, CredentialKey, Vault};
use sidecar_core::models::AnalysisSource;
use sidecar_core::repo::{EventsRepository, SettingsRepository};
use sidecar_core::SidecarResult;

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
    #[serde(default)]
    pub source_identifier: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

pub async fn analyze(State(state): State<ApiState>, Json(req): Json<AnalyzeRequest>) -> Result<Json<AnalysisResult>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }
    let result = state.analyzer.analyze(&req.text)?;
    Ok(Json(result))
}

#[derive(Debug, Serialize)]
pub struct ThreatAnalyticsBody {
    pub is_threat: bool,
    pub threat_type: Option<String>,
    pub risk_score: i64,
    pub confidence: f64,
}

#[derive(Debug, Serialize)]
pub struct ThreatAnalyticsResponse {
    #[serde(flatten)]
    pub analysis: ThreatAnalyticsBody,
    pub analysis_source: AnalysisSource,
}

pub async fn threat_analytics(
    State(state): State<ApiState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<ThreatAnalyticsResponse>, ApiError> {
    if req.text.trim().is_empty() {
        return Err(ApiError::Validation("text must not be empty".to_string()));
    }

    let settings = SettingsRepository::new(&state.store).get()?;

    let (body, source) = if settings.cloud_mode_enabled {
        match cloud_client()? {
            Some(client) => match client.threat_analytics(&req.text, req.source_identifier.as_deref()).await {
                Ok(cloud_result) => (
                    ThreatAnalyticsBody {
                        is_threat: cloud_result.is_threat,
                        threat_type: cloud_result.threat_type,
                        risk_score: cloud_result.risk_score,
                        confidence: cloud_result.confidence,
                    },
                    AnalysisSource::Cloud,
                ),
                Err(err) => {
                    log::warn!("[server] cloud analyze failed, falling back to local: {err}");
                    (local_body(&state, &req.text)?, AnalysisSource::LocalFallback)
                }
            },
            None => (local_body(&state, &req.text)?, AnalysisSource::LocalFallback),
        }
    } else {
        (local_body(&state, &req.text)?, AnalysisSource::Local)
    };

    let event = state
        .analyzer
        .analyze_to_event(&req.text, settings.store_text_content, None, req.source_identifier.clone(), req.session_id.clone())?;
    if let Err(err) = EventsRepository::new(&state.store).insert(&event) {
        log::warn!("[server] failed to persist threat-analytics event: {err}");
    }

    Ok(Json(ThreatAnalyticsResponse { analysis: body, analysis_source: source }))
}

fn local_body(state: &ApiState, text: &str) -> Result<ThreatAnalyticsBody, ApiError> {
    let result = state.analyzer.analyze(text)?;
    Ok(ThreatAnalyticsBody {
        is_threat: result.is_threat,
        threat_type: result.threat_type,
        risk_score: result.risk_score,
        confidence: result.confidence,
    })
}

fn cloud_client() -> SidecarResult<Option<CloudClient>> {
    let Some(api_key) = Vault::get(&CredentialKey::CloudApiKey)? else {
        return Ok(None);
    };
    let base_url = Vault::get(&CredentialKey::CloudBaseUrl)?.unwrap_or_else(|| crate::state::DEFAULT_CLOUD_BASE_URL.to_string());
    Ok(Some(CloudClient::new(base_url, api_key)?))
}
