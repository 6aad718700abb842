// ── sidecar-server ───────────────────────────────────────────────────────────
// The local HTTP API: health, analysis, threat-intel events, rule/override/
// pricing/budget/settings CRUD, paginated cost records, and proxy control.
// Mounted standalone; `main.rs` additionally serves the multi-provider proxy
// on its own port via `sidecar_proxy::router`.

pub mod error;
pub mod proxy_control;
pub mod routes;
pub mod state;

use axum::http::HeaderValue;
use axum::routing::{delete, get, post, put};
use axum::Router;
use sidecar_core::repo::SettingsRepository;
use state::ApiState;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Browser requests are only permitted from the configured local
/// host+port — re-checked per request against the live settings row so a
/// settings change takes effect without a restart, per §4.8's "enforces
/// that browser origins only include the configured local host+port".
fn local_origin_only(store: std::sync::Arc<sidecar_core::Store>) -> AllowOrigin {
    AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let Ok(settings) = SettingsRepository::new(&store).get() else {
            return false;
        };
        origin.to_str().map(|o| is_allowed_origin(o, &settings.server_host, settings.server_port)).unwrap_or(false)
    })
}

/// Accepts only `http://127.0.0.1:{port}`, `http://localhost:{port}`, or
/// `http://{configured-host}:{port}` — never a wildcard, per §4.8.
fn is_allowed_origin(origin: &str, configured_host: &str, port: u16) -> bool {
    let suffix = format!(":{port}");
    if !origin.ends_with(&suffix) {
        return false;
    }
    origin.starts_with("http://127.0.0.1") || origin.starts_with("http://localhost") || origin.starts_with(&format!("http://{configured_host}"))
}

pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new().allow_origin(local_origin_only(state.store.clone())).allow_methods(tower_http::cors::Any).allow_headers(tower_http::cors::Any);

    Router::new()
        .route("/health", get(routes::health::health))
        .route("/analyze", post(routes::analyze::analyze))
        .route("/api/threat-analytics/", post(routes::analyze::threat_analytics))
        .route("/api/threat-intel", get(routes::events::list))
        .route("/api/threat-intel/:id", get(routes::events::get))
        .route("/api/rules", get(routes::rules::list).post(routes::rules::create))
        .route("/api/rules/:id", put(routes::rules::update).delete(routes::rules::delete))
        .route("/api/rules/community", get(routes::rules::list_community))
        .route("/api/rules/counts", get(routes::rules::counts))
        .route("/api/rules/generate", post(routes::rules::generate))
        .route("/api/rule-overrides", get(routes::rule_overrides::list))
        .route(
            "/api/rule-overrides/:rule_id",
            put(routes::rule_overrides::upsert).delete(routes::rule_overrides::delete),
        )
        .route("/api/overrides", get(routes::tool_overrides::list).put(routes::tool_overrides::upsert))
        .route("/api/overrides/:tool_id", delete(routes::tool_overrides::delete))
        .route("/api/tools/essential", get(routes::rules::list_essential_tools))
        .route("/api/pricing", get(routes::pricing::list).put(routes::pricing::upsert))
        .route("/api/budgets", get(routes::budgets::list).put(routes::budgets::upsert))
        .route("/api/cost-records", get(routes::costs::list))
        .route("/api/settings", get(routes::settings::get).put(routes::settings::update))
        .route("/api/settings/cloud/credentials", post(routes::settings::configure_cloud_credentials))
        .route("/proxy/status", get(routes::proxy::status))
        .route("/proxy/start", post(routes::proxy::start))
        .route("/proxy/stop", delete(routes::proxy::stop))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_loopback_and_configured_host_on_the_right_port() {
        assert!(is_allowed_origin("http://127.0.0.1:8741", "127.0.0.1", 8741));
        assert!(is_allowed_origin("http://localhost:8741", "127.0.0.1", 8741));
        assert!(is_allowed_origin("http://192.168.1.5:8741", "192.168.1.5", 8741));
    }

    #[test]
    fn rejects_wrong_port_or_foreign_host() {
        assert!(!is_allowed_origin("http://127.0.0.1:9999", "127.0.0.1", 8741));
        assert!(!is_allowed_origin("http://evil.example:8741", "127.0.0.1", 8741));
    }
}
