// ── Config file I/O ──────────────────────────────────────────────────────────
// Parse-or-regenerate at startup; rewrite whenever settings change so the
// on-disk file and the settings store never drift apart.

use crate::document::{BudgetSection, ConfigDocument, ProxySection, SecuritySection, ServerSection, ToolsSection};
use sidecar_core::models::{Budget, Settings};
use sidecar_core::SidecarResult;
use std::path::Path;

/// Loads and parses the config file at `path`. Returns `Ok(None)` if the
/// file doesn't exist yet (first run) rather than an error — the caller
/// regenerates it from the settings store in that case.
pub fn load(path: &Path) -> SidecarResult<Option<ConfigDocument>> {
    if !path.exists() {
        return Ok(None);
    }
    let text = std::fs::read_to_string(path)?;
    match toml::from_str(&text) {
        Ok(doc) => Ok(Some(doc)),
        Err(err) => {
            log::warn!("[config] failed to parse {}: {err} — treating as absent", path.display());
            Ok(None)
        }
    }
}

/// Writes `contents` to `path`, creating parent directories as needed.
pub fn write(path: &Path, contents: &str) -> SidecarResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, contents)?;
    Ok(())
}

/// Builds a fully-populated, commented config document from the current
/// settings store and global budget row — used both to regenerate a
/// missing/incomplete file on startup and to rewrite it after a
/// UI-originated settings change.
pub fn render_template(settings: &Settings, global_budget: Option<&Budget>) -> String {
    let doc = ConfigDocument {
        server: Some(ServerSection { host: Some(settings.server_host.clone()), port: Some(settings.server_port) }),
        security: Some(SecuritySection { block_mode: Some(settings.block_threats), output_scan: Some(true) }),
        budget: Some(BudgetSection {
            daily_limit: global_budget.and_then(|b| b.daily_limit),
            warn: Some(global_budget.map(|b| b.action.as_str() == "warn").unwrap_or(true)),
            block: Some(global_budget.map(|b| b.action.as_str() == "block").unwrap_or(false)),
        }),
        tools: Some(ToolsSection { enforcement: Some(true) }),
        proxy: Some(ProxySection {
            integration: Some(false),
            mode: Some("multi-provider".to_string()),
            provider: None,
            host: Some(settings.server_host.clone()),
            port: Some(settings.server_port + 1),
        }),
    };

    let body = toml::to_string_pretty(&doc).unwrap_or_default();
    format!(
        "# securevector-sidecar configuration\n\
         # Regenerated from the settings store whenever this file is missing\n\
         # or incomplete. Edit freely — recognized sections are pushed into\n\
         # the settings store on next startup, and this file is rewritten\n\
         # whenever settings change through the UI.\n\n{body}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn load_missing_file_returns_none() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        assert!(load(&path).unwrap().is_none());
    }

    #[test]
    fn write_then_load_roundtrips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let settings = Settings::default();
        let rendered = render_template(&settings, None);
        write(&path, &rendered).unwrap();
        let doc = load(&path).unwrap().unwrap();
        assert_eq!(doc.server.unwrap().port, Some(settings.server_port));
    }

    #[test]
    fn malformed_file_is_treated_as_absent() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "this is not [valid toml").unwrap();
        assert!(load(&path).unwrap().is_none());
    }
}
