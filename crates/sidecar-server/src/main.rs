// ── securevector-sidecar daemon ──────────────────────────────────────────────
// The headless entry point: opens the store (running migrations), hydrates
// the settings store from the on-disk config file (or regenerates it on
// first run), bootstraps the analyzer and cost recorder, and serves the API
// router on the configured host/port. The multi-provider proxy itself is
// not started here — it's a child task the API's own `/proxy/start` route
// spawns, per §4.8's "spawns the proxy as a child unit" clause.
//
// The CLI flag parsing, system tray, and native window around this binary
// are out of scope for this crate; this is the daemon those wrappers shell
// out to.

use sidecar_analyzer::ThreatAnalyzer;
use sidecar_core::repo::SettingsRepository;
use sidecar_core::{SidecarError, SidecarResult, Store};
use sidecar_cost::CostRecorder;
use sidecar_server::state::ApiState;
use std::sync::Arc;

#[tokio::main]
async fn main() -> SidecarResult<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let db_path = sidecar_core::paths::database_path()?;
    let config_path = sidecar_core::paths::config_file_path()?;
    log::info!("[main] opening store at {}", db_path.display());

    let store = Arc::new(Store::open(&db_path)?);
    let health = store.health()?;
    log::info!(
        "[main] schema version {} of {} ({} threat-intel records)",
        health.schema_version,
        health.target_version,
        health.record_count
    );

    hydrate_settings(&store, &config_path)?;

    let analyzer = Arc::new(ThreatAnalyzer::new(store.clone()));
    analyzer.ensure_loaded()?;

    let cost_recorder = Arc::new(CostRecorder::new(store.clone()));

    let settings = SettingsRepository::new(&store).get()?;
    let state = ApiState::new(store.clone(), analyzer, cost_recorder, settings.block_threats, config_path);

    let bind = format!("{}:{}", settings.server_host, settings.server_port);
    let addr: std::net::SocketAddr = bind
        .parse()
        .map_err(|e| SidecarError::Config(format!("invalid server bind address '{bind}': {e}")))?;
    let router = sidecar_server::router(state.clone());

    log::info!("[main] serving API on http://{addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(SidecarError::Io)?;

    // The proxy is a child task of this process; make sure it's torn down
    // before we exit rather than leaving its listener orphaned.
    let _ = state.proxy.stop().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        log::warn!("[main] failed to install ctrl-c handler: {err}");
    }
    log::info!("[main] shutdown signal received");
}

/// Parses the on-disk config file and reconciles it into the settings store.
/// If the file is missing or failed to parse, regenerates it from whatever
/// is already in the store (first run: the default settings row).
fn hydrate_settings(store: &Store, config_path: &std::path::Path) -> SidecarResult<()> {
    match sidecar_config::load(config_path)? {
        Some(doc) => {
            sidecar_config::reconcile(store, &doc)?;
            log::info!("[main] reconciled config file at {}", config_path.display());
        }
        None => {
            let settings = SettingsRepository::new(store).get()?;
            let global_budget = sidecar_core::repo::BudgetsRepository::new(store).get("global")?;
            let rendered = sidecar_config::render_template(&settings, global_budget.as_ref());
            sidecar_config::write(config_path, &rendered)?;
            log::info!("[main] regenerated config file at {}", config_path.display());
        }
    }
    Ok(())
}
