// ── Health route ─────────────────────────────────────────────────────────────

use crate::state::ApiState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Serialize)]
struct HealthDatabase {
    connected: bool,
    record_count: i64,
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
    database: HealthDatabase,
    rules_loaded: i64,
}

pub async fn health(State(state): State<ApiState>) -> Response {
    let db_health = state.store.health();
    let rule_counts = sidecar_core::repo::RulesRepository::new(&state.store).rule_counts();

    let (database, rules_loaded, status) = match (db_health, rule_counts) {
        (Ok(health), Ok(counts)) => {
            let status = if health.connected && health.schema_version == health.target_version {
                "ok"
            } else {
                "degraded"
            };
            (
                HealthDatabase { connected: health.connected, record_count: health.record_count },
                counts.community + counts.custom,
                status,
            )
        }
        _ => (HealthDatabase { connected: false, record_count: 0 }, 0, "degraded"),
    };

    let body = HealthBody { status, version: env!("CARGO_PKG_VERSION"), database, rules_loaded };
    (StatusCode::OK, Json(json!(body))).into_response()
}
