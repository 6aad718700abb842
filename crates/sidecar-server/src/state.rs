// ── Shared API state ─────────────────────────────────────────────────────────

use crate::proxy_control::ProxyControl;
use sidecar_analyzer::ThreatAnalyzer;
use sidecar_core::Store;
use sidecar_cost::CostRecorder;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Cloud endpoint this binary talks to when cloud mode is enabled. Not user
/// configurable beyond supplying credentials for it.
pub const DEFAULT_CLOUD_BASE_URL: &str = "https://cloud.securevector.dev";

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<Store>,
    pub analyzer: Arc<ThreatAnalyzer>,
    pub cost_recorder: Arc<CostRecorder>,
    pub block_mode: Arc<AtomicBool>,
    pub proxy: Arc<ProxyControl>,
    pub config_path: PathBuf,
}

impl ApiState {
    pub fn new(
        store: Arc<Store>,
        analyzer: Arc<ThreatAnalyzer>,
        cost_recorder: Arc<CostRecorder>,
        block_mode: bool,
        config_path: PathBuf,
    ) -> Self {
        Self {
            store,
            analyzer,
            cost_recorder,
            block_mode: Arc::new(AtomicBool::new(block_mode)),
            proxy: Arc::new(ProxyControl::new()),
            config_path,
        }
    }
}
