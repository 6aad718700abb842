// ── Schema migrations ───────────────────────────────────────────────────────
// Forward-only, explicitly numbered. Unlike the rest of this workspace's
// `ALTER TABLE IF NOT EXISTS`-and-ignore-the-error convention, this
// component's invariant — never run a migration twice, one `schema_version`
// row per applied step — needs the stricter match-dispatched style: each
// version is its own `execute_batch` inside a transaction, recorded only on
// success.

use crate::error::{SidecarError, SidecarResult};
use log::info;
use rusqlite::{Connection, Transaction};

/// Highest schema version this binary knows how to migrate to.
pub const CURRENT_SCHEMA_VERSION: i64 = 7;

pub fn current_version(conn: &Connection) -> SidecarResult<i64> {
    let table_exists: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
            [],
            |_| Ok(true),
        )
        .unwrap_or(false);
    if !table_exists {
        return Ok(0);
    }
    let version: Option<i64> = conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get(0),
    )?;
    Ok(version.unwrap_or(0))
}

/// Runs every migration from `current+1` through [`CURRENT_SCHEMA_VERSION`],
/// each inside its own transaction. Never re-orders, never re-runs a step
/// already recorded in `schema_version`.
pub fn run_migrations(conn: &mut Connection) -> SidecarResult<i64> {
    conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA foreign_keys = ON;")?;

    let mut version = current_version(conn)?;
    info!("[store] current schema version: {}", version);

    while version < CURRENT_SCHEMA_VERSION {
        let next = version + 1;
        let tx = conn.transaction()?;
        let description = apply_migration(&tx, next)?;
        record_migration(&tx, next, description)?;
        tx.commit()?;
        info!("[store] applied migration v{}: {}", next, description);
        version = next;
    }

    Ok(version)
}

fn record_migration(tx: &Transaction, version: i64, description: &str) -> SidecarResult<()> {
    tx.execute(
        "INSERT INTO schema_version (version, applied_at, description) VALUES (?1, datetime('now'), ?2)",
        rusqlite::params![version, description],
    )?;
    Ok(())
}

fn apply_migration(tx: &Transaction, version: i64) -> SidecarResult<&'static str> {
    match version {
        1 => {
            tx.execute_batch(
                "
                CREATE TABLE IF NOT EXISTS schema_version (
                    version INTEGER PRIMARY KEY,
                    applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    description TEXT NOT NULL
                );

                CREATE TABLE threat_intel_records (
                    id TEXT PRIMARY KEY,
                    request_id TEXT,
                    text_content TEXT,
                    text_hash TEXT NOT NULL,
                    text_length INTEGER NOT NULL,
                    is_threat INTEGER NOT NULL,
                    threat_type TEXT,
                    risk_score INTEGER NOT NULL CHECK (risk_score >= 0 AND risk_score <= 100),
                    confidence REAL NOT NULL CHECK (confidence >= 0 AND confidence <= 1),
                    matched_rules TEXT NOT NULL,
                    source_identifier TEXT,
                    session_id TEXT,
                    processing_time_ms INTEGER NOT NULL,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    metadata TEXT,
                    llm_reviewed INTEGER NOT NULL DEFAULT 0,
                    llm_agrees INTEGER,
                    llm_confidence REAL,
                    llm_explanation TEXT,
                    llm_risk_adjustment INTEGER,
                    llm_model_used TEXT
                );
                CREATE INDEX idx_threat_intel_created_at ON threat_intel_records(created_at DESC);
                CREATE INDEX idx_threat_intel_is_threat ON threat_intel_records(is_threat);
                CREATE INDEX idx_threat_intel_threat_type ON threat_intel_records(threat_type);
                CREATE INDEX idx_threat_intel_source ON threat_intel_records(source_identifier);
                CREATE INDEX idx_threat_intel_hash ON threat_intel_records(text_hash);
                CREATE INDEX idx_threat_intel_request_id ON threat_intel_records(request_id);

                CREATE TABLE custom_rules (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    category TEXT NOT NULL,
                    description TEXT NOT NULL,
                    severity TEXT NOT NULL CHECK (severity IN ('low','medium','high','critical')),
                    patterns TEXT NOT NULL,
                    enabled INTEGER NOT NULL DEFAULT 1,
                    metadata TEXT,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                CREATE INDEX idx_custom_rules_category ON custom_rules(category);

                CREATE TABLE rule_overrides (
                    id TEXT PRIMARY KEY,
                    original_rule_id TEXT NOT NULL UNIQUE,
                    enabled INTEGER,
                    severity TEXT CHECK (severity IS NULL OR severity IN ('low','medium','high','critical')),
                    patterns TEXT,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );

                CREATE TABLE app_settings (
                    id INTEGER PRIMARY KEY CHECK (id = 1),
                    theme TEXT NOT NULL DEFAULT 'system' CHECK (theme IN ('system','light','dark')),
                    server_port INTEGER NOT NULL DEFAULT 8741 CHECK (server_port >= 1024 AND server_port <= 65535),
                    server_host TEXT NOT NULL DEFAULT '127.0.0.1',
                    retention_days INTEGER NOT NULL DEFAULT 30 CHECK (retention_days >= 1 AND retention_days <= 365),
                    store_text_content INTEGER NOT NULL DEFAULT 1,
                    notifications_enabled INTEGER NOT NULL DEFAULT 1,
                    launch_on_startup INTEGER NOT NULL DEFAULT 0,
                    minimize_to_tray INTEGER NOT NULL DEFAULT 1,
                    window_width INTEGER,
                    window_height INTEGER,
                    window_x INTEGER,
                    window_y INTEGER,
                    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                INSERT INTO app_settings (id) VALUES (1);
                ",
            )?;
            Ok("Initial schema: threat intel, custom rules, overrides, settings")
        }
        2 => {
            tx.execute_batch(
                "
                CREATE TABLE community_rules (
                    id TEXT PRIMARY KEY,
                    name TEXT NOT NULL,
                    category TEXT NOT NULL,
                    description TEXT NOT NULL,
                    severity TEXT NOT NULL CHECK (severity IN ('low','medium','high','critical')),
                    patterns TEXT NOT NULL,
                    enabled INTEGER NOT NULL DEFAULT 1,
                    source_file TEXT,
                    metadata TEXT,
                    loaded_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                CREATE INDEX idx_community_rules_category ON community_rules(category);
                CREATE INDEX idx_community_rules_enabled ON community_rules(enabled);
                ",
            )?;
            Ok("Add community rules cache table")
        }
        3 => {
            tx.execute_batch(
                "
                ALTER TABLE app_settings ADD COLUMN cloud_mode_enabled INTEGER NOT NULL DEFAULT 0;
                ALTER TABLE app_settings ADD COLUMN cloud_user_email TEXT;
                ALTER TABLE app_settings ADD COLUMN cloud_connected_at TIMESTAMP;
                ",
            )?;
            Ok("Add cloud mode fields to app_settings")
        }
        4 => {
            tx.execute_batch(
                "
                CREATE TABLE essential_tool_overrides (
                    tool_id TEXT PRIMARY KEY,
                    action TEXT NOT NULL CHECK (action IN ('block','allow','log_only')),
                    rate_limit_max_calls INTEGER,
                    rate_limit_window_seconds INTEGER,
                    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                ",
            )?;
            Ok("Add essential_tool_overrides table")
        }
        5 => {
            tx.execute_batch(
                "
                CREATE TABLE pricing_entries (
                    provider TEXT NOT NULL,
                    model_id TEXT NOT NULL,
                    input_per_million REAL NOT NULL CHECK (input_per_million >= 0),
                    output_per_million REAL NOT NULL CHECK (output_per_million >= 0),
                    PRIMARY KEY (provider, model_id)
                );

                CREATE TABLE cost_records (
                    id TEXT PRIMARY KEY,
                    agent_id TEXT NOT NULL,
                    provider TEXT NOT NULL,
                    model_id TEXT NOT NULL,
                    input_tokens INTEGER NOT NULL,
                    output_tokens INTEGER NOT NULL,
                    input_cached_tokens INTEGER NOT NULL DEFAULT 0,
                    input_cost_usd REAL NOT NULL,
                    output_cost_usd REAL NOT NULL,
                    total_cost_usd REAL NOT NULL,
                    rate_input REAL,
                    rate_output REAL,
                    pricing_known INTEGER NOT NULL DEFAULT 0,
                    request_id TEXT,
                    created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                CREATE INDEX idx_cost_records_agent_day
                    ON cost_records(agent_id, created_at);
                CREATE INDEX idx_cost_records_provider ON cost_records(provider);
                CREATE INDEX idx_cost_records_model ON cost_records(model_id);
                ",
            )?;
            Ok("Add pricing_entries and cost_records tables")
        }
        6 => {
            tx.execute_batch(
                "
                CREATE TABLE budgets (
                    scope TEXT PRIMARY KEY,
                    daily_limit REAL CHECK (daily_limit IS NULL OR daily_limit >= 0),
                    action TEXT NOT NULL CHECK (action IN ('warn','block')),
                    updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
                );
                ",
            )?;
            Ok("Add budgets table")
        }
        7 => {
            tx.execute_batch(
                "ALTER TABLE app_settings ADD COLUMN block_threats INTEGER NOT NULL DEFAULT 0;",
            )?;
            Ok("Add block_threats setting for proxy blocking mode")
        }
        other => Err(SidecarError::Migration(format!(
            "unknown migration version: {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn in_memory_db() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    #[test]
    fn migrations_run_cleanly() {
        let mut conn = in_memory_db();
        let version = run_migrations(&mut conn).unwrap();
        assert_eq!(version, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn migrations_are_idempotent_across_runs() {
        let mut conn = in_memory_db();
        run_migrations(&mut conn).unwrap();
        let first_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        run_migrations(&mut conn).unwrap();
        let second_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM schema_version", [], |r| r.get(0))
            .unwrap();
        assert_eq!(first_count, second_count);
        assert_eq!(first_count, CURRENT_SCHEMA_VERSION);
    }

    #[test]
    fn singleton_settings_row_exists() {
        let mut conn = in_memory_db();
        run_migrations(&mut conn).unwrap();
        let id: i64 = conn
            .query_row("SELECT id FROM app_settings", [], |r| r.get(0))
            .unwrap();
        assert_eq!(id, 1);
    }

    #[test]
    fn core_tables_created() {
        let mut conn = in_memory_db();
        run_migrations(&mut conn).unwrap();
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();
        for expected in [
            "threat_intel_records",
            "custom_rules",
            "rule_overrides",
            "app_settings",
            "community_rules",
            "essential_tool_overrides",
            "pricing_entries",
            "cost_records",
            "budgets",
        ] {
            assert!(tables.contains(&expected.to_string()), "missing table {expected}");
        }
    }
}
