// ── Settings repository ──────────────────────────────────────────────────────
// The singleton `app_settings` row (id = 1, enforced by a CHECK constraint).
// Always present after migrations run; `get` is infallible in practice but
// still returns a Result to stay consistent with the rest of the layer.

use crate::error::SidecarResult;
use crate::models::Settings;
use crate::store::Store;
use chrono::{DateTime, Utc};
use rusqlite::Row;

pub struct SettingsRepository<'a> {
    store: &'a Store,
}

impl<'a> SettingsRepository<'a> {
    pub fn new(store: &'a Store) -> Self {
        Self { store }
    }

    pub fn get(&self) -> SidecarResult<Settings> {
        self.store.with_conn(|conn| {
            Ok(conn.query_row(
                "SELECT theme, server_host, server_port, retention_days, store_text_content,
                        notifications_enabled, launch_on_startup, minimize_to_tray,
                        window_width, window_height, window_x, window_y,
                        cloud_mode_enabled, cloud_user_email, cloud_connected_at, block_threats, updated_at
                 FROM app_settings WHERE id = 1",
                [],
                Self::from_row,
            )?)
        })
    }

    /// Applies a partial update. `f` receives the current settings and
    /// mutates the fields it cares about; everything else is written back
    /// unchanged.
    pub fn update(&self, f: impl FnOnce(&mut Settings)) -> SidecarResult<Settings> {
        let mut settings = self.get()?;
        f(&mut settings);
        settings.updated_at = Utc::now();
        self.store.with_conn(|conn| {
            conn.execute(
                "UPDATE app_settings SET
                    theme=?1, server_host=?2, server_port=?3, retention_days=?4, store_text_content=?5,
                    notifications_enabled=?6, launch_on_startup=?7, minimize_to_tray=?8,
                    window_width=?9, window_height=?10, window_x=?11, window_y=?12,
                    cloud_mode_enabled=?13, cloud_user_email=?14, cloud_connected_at=?15,
                    block_threats=?16, updated_at=?17
                 WHERE id = 1",
                rusqlite::params![
                    settings.theme,
                    settings.server_host,
                    settings.server_port,
                    settings.retention_days,
                    settings.store_text_content,
                    settings.notifications_enabled,
                    settings.launch_on_startup,
                    settings.minimize_to_tray,
                    settings.window_width,
                    settings.window_height,
                    settings.window_x,
                    settings.window_y,
                    settings.cloud_mode_enabled,
                    settings.cloud_user_email,
                    settings.cloud_connected_at.map(|dt| dt.to_rfc3339()),
                    settings.block_threats,
                    settings.updated_at.to_rfc3339(),
                ],
            )?;
            Ok(())
        })?;
        Ok(settings)
    }

    fn from_row(row: &Row) -> rusqlite::Result<Settings> {
        let cloud_connected_at: Option<String> = row.get(14)?;
        let updated_at: String = row.get(16)?;
        let server_port: i64 = row.get(2)?;
        Ok(Settings {
            theme: row.get(0)?,
            server_host: row.get(1)?,
            server_port: server_port as u16,
            retention_days: row.get(3)?,
            store_text_content: row.get(4)?,
            notifications_enabled: row.get(5)?,
            launch_on_startup: row.get(6)?,
            minimize_to_tray: row.get(7)?,
            window_width: row.get(8)?,
            window_height: row.get(9)?,
            window_x: row.get(10)?,
            window_y: row.get(11)?,
            cloud_mode_enabled: row.get(12)?,
            cloud_user_email: row.get(13)?,
            cloud_connected_at: cloud_connected_at
                .as_deref()
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc)),
            block_threats: row.get(15)?,
            updated_at: DateTime::parse_from_rfc3339(&updated_at)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_returns_defaults_after_migration() {
        let store = Store::open_in_memory().unwrap();
        let repo = SettingsRepository::new(&store);
        let settings = repo.get().unwrap();
        assert_eq!(settings.theme, "system");
        assert_eq!(settings.server_port, 8741);
        assert_eq!(settings.retention_days, 30);
        assert!(!settings.block_threats);
    }

    #[test]
    fn update_persists_partial_change() {
        let store = Store::open_in_memory().unwrap();
        let repo = SettingsRepository::new(&store);
        repo.update(|s| {
            s.block_threats = true;
            s.theme = "dark".to_string();
        })
        .unwrap();

        let reloaded = repo.get().unwrap();
        assert!(reloaded.block_threats);
        assert_eq!(reloaded.theme, "dark");
        assert_eq!(reloaded.server_port, 8741);
    }
}
