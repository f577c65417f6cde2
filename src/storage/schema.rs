//! Database schema for the local manifest store.
//!
//! One row per (user, game) holds the remote manifest as a JSON document;
//! completion notifications are appended to `sync_events` for history.

use rusqlite::{Connection, Result};

/// Current schema version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Timestamps are INTEGER. `manifests.last_updated` is Unix seconds,
/// `sync_events.created_at` is Unix milliseconds.
pub const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- Remote manifests: full replace on every committed reconciliation
CREATE TABLE IF NOT EXISTS manifests (
    user_id TEXT NOT NULL,
    game_id TEXT NOT NULL,
    files TEXT NOT NULL DEFAULT '{}',
    last_updated INTEGER NOT NULL,
    PRIMARY KEY (user_id, game_id)
);

-- Completion notifications reported by clients
CREATE TABLE IF NOT EXISTS sync_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id TEXT NOT NULL,
    game_id TEXT NOT NULL,
    success INTEGER NOT NULL,
    error TEXT,
    uploaded TEXT NOT NULL DEFAULT '[]',
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_sync_events_unit ON sync_events(user_id, game_id, created_at);
"#;

/// Apply pragmas and the schema to a fresh or existing connection.
///
/// # Errors
///
/// Returns an error if any statement fails.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}
