// ── Reconciliation ────────────────────────────────────────────────────────────
// On startup: parse the config file; push every recognized value into the
// settings store (and the global budget row, since that's where a daily
// cap actually lives). Sections with no settings-store column of their own
// (`tools.enforcement`, `proxy.*`) are read back out of the parsed document
// directly by whichever component owns that concern — the config file, not
// a settings column, is the source of truth for those.

use crate::document::ConfigDocument;
use sidecar_core::models::BudgetAction;
use sidecar_core::repo::{BudgetsRepository, SettingsRepository};
use sidecar_core::{SidecarResult, Store};

/// Applies every section of `doc` that has a home in the settings store.
/// Sections absent from `doc` are left untouched.
pub fn reconcile(store: &Store, doc: &ConfigDocument) -> SidecarResult<()> {
    if let Some(server) = &doc.server {
        SettingsRepository::new(store).update(|settings| {
            if let Some(host) = &server.host {
                settings.server_host = host.clone();
            }
            if let Some(port) = server.port {
                settings.server_port = port;
            }
        })?;
    }

    if let Some(security) = &doc.security {
        if let Some(block_mode) = security.block_mode {
            SettingsRepository::new(store).update(|settings| {
                settings.block_threats = block_mode;
            })?;
        }
    }

    if let Some(budget) = &doc.budget {
        let action = if budget.block.unwrap_or(false) {
            BudgetAction::Block
        } else if budget.warn.unwrap_or(false) {
            BudgetAction::Warn
        } else {
            BudgetAction::Warn
        };
        if budget.daily_limit.is_some() || budget.warn.is_some() || budget.block.is_some() {
            BudgetsRepository::new(store).upsert("global", budget.daily_limit, action)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{BudgetSection, SecuritySection, ServerSection};

    #[test]
    fn server_section_updates_settings_store() {
        let store = Store::open_in_memory().unwrap();
        let doc = ConfigDocument {
            server: Some(ServerSection { host: Some("0.0.0.0".into()), port: Some(9191) }),
            ..Default::default()
        };
        reconcile(&store, &doc).unwrap();
        let settings = SettingsRepository::new(&store).get().unwrap();
        assert_eq!(settings.server_host, "0.0.0.0");
        assert_eq!(settings.server_port, 9191);
    }

    #[test]
    fn security_block_mode_updates_block_threats() {
        let store = Store::open_in_memory().unwrap();
        let doc = ConfigDocument { security: Some(SecuritySection { block_mode: Some(true), output_scan: None }), ..Default::default() };
        reconcile(&store, &doc).unwrap();
        assert!(SettingsRepository::new(&store).get().unwrap().block_threats);
    }

    #[test]
    fn budget_section_upserts_global_budget() {
        let store = Store::open_in_memory().unwrap();
        let doc = ConfigDocument {
            budget: Some(BudgetSection { daily_limit: Some(2.5), warn: None, block: Some(true) }),
            ..Default::default()
        };
        reconcile(&store, &doc).unwrap();
        let budget = BudgetsRepository::new(&store).get("global").unwrap().unwrap();
        assert_eq!(budget.daily_limit, Some(2.5));
        assert_eq!(budget.action, BudgetAction::Block);
    }

    #[test]
    fn missing_sections_leave_settings_untouched() {
        let store = Store::open_in_memory().unwrap();
        let before = SettingsRepository::new(&store).get().unwrap();
        reconcile(&store, &ConfigDocument::default()).unwrap();
        let after = SettingsRepository::new(&store).get().unwrap();
        assert_eq!(before.server_port, after.server_port);
    }
}
