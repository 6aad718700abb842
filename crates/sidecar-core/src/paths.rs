// ── Platform paths ─────────────────────────────────────────────────────────
// OS-appropriate data/config/log directories, all namespaced under a single
// "securevector-sidecar" qualifier so the binary never collides with other
// tools sharing the same machine.

use crate::error::{SidecarError, SidecarResult};
use std::path::PathBuf;

const APP_DIR_NAME: &str = "securevector-sidecar";

/// Directory for persistent application data (the SQLite database, the
/// community rules cache marker).
pub fn data_dir() -> SidecarResult<PathBuf> {
    let base = dirs::data_dir()
        .ok_or_else(|| SidecarError::Config("could not resolve OS data directory".into()))?;
    Ok(base.join(APP_DIR_NAME))
}

/// Directory for the human-editable configuration file.
pub fn config_dir() -> SidecarResult<PathBuf> {
    let base = dirs::config_dir()
        .ok_or_else(|| SidecarError::Config("could not resolve OS config directory".into()))?;
    Ok(base.join(APP_DIR_NAME))
}

/// Directory for log files.
pub fn log_dir() -> SidecarResult<PathBuf> {
    let base = dirs::data_local_dir()
        .ok_or_else(|| SidecarError::Config("could not resolve OS local-data directory".into()))?;
    Ok(base.join(APP_DIR_NAME).join("logs"))
}

/// Path to the SQLite database file, creating its parent directory if needed.
pub fn database_path() -> SidecarResult<PathBuf> {
    let dir = data_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("sidecar.db"))
}

/// Path to the on-disk TOML configuration file, creating its parent
/// directory if needed.
pub fn config_file_path() -> SidecarResult<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir)?;
    Ok(dir.join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_dirs_are_namespaced() {
        assert!(data_dir().unwrap().ends_with(APP_DIR_NAME));
        assert!(config_dir().unwrap().ends_with(APP_DIR_NAME));
    }
}
