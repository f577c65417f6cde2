//! SQLite-backed manifest store.
//!
//! Backs the `local` backend: one database under the cloudsave home holds
//! every (user, game) manifest plus completion history.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{Connection, OptionalExtension};
use tracing::debug;

use super::ManifestStore;
use super::events::{SyncEvent, insert_event, prune_events, recent_events};
use super::schema::apply_schema;
use crate::error::{Error, Result};
use crate::model::{CompletionRequest, Manifest, RemoteManifest};

/// Completion events kept per (user, game); older rows are pruned on insert.
pub const EVENT_HISTORY_LIMIT: u32 = 100;

/// SQLite-based manifest store.
///
/// The connection sits behind a mutex so the store can be shared across
/// threads as `Arc<dyn ManifestStore>`.
#[derive(Debug)]
pub struct SqliteManifestStore {
    conn: Mutex<Connection>,
}

impl SqliteManifestStore {
    /// Open (or create) a database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_timeout(path, None)
    }

    /// Open a database with an optional busy timeout.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established or schema fails.
    pub fn open_with_timeout(path: &Path, timeout_ms: Option<u64>) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        let conn = Connection::open(path)?;
        let timeout = timeout_ms.map_or(Duration::from_secs(5), Duration::from_millis);
        conn.busy_timeout(timeout)?;

        apply_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Open an in-memory database (for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be established.
    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        apply_schema(&conn)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Other("Manifest store lock poisoned".to_string()))
    }

    /// Recent completion history for a pair, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub fn recent_events(&self, user_id: &str, game_id: &str, limit: Option<u32>) -> Result<Vec<SyncEvent>> {
        let conn = self.conn()?;
        Ok(recent_events(&conn, user_id, game_id, limit)?)
    }
}

impl ManifestStore for SqliteManifestStore {
    fn load(&self, user_id: &str, game_id: &str) -> Result<Option<RemoteManifest>> {
        let conn = self.conn()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT files, last_updated FROM manifests WHERE user_id = ?1 AND game_id = ?2",
                rusqlite::params![user_id, game_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((files, last_updated)) = row else {
            return Ok(None);
        };

        Ok(Some(RemoteManifest {
            user_id: user_id.to_string(),
            game_id: game_id.to_string(),
            files: serde_json::from_str(&files)?,
            last_updated,
        }))
    }

    fn put(&self, user_id: &str, game_id: &str, files: &Manifest, last_updated: i64) -> Result<()> {
        let json = serde_json::to_string(files)?;
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO manifests (user_id, game_id, files, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(user_id, game_id) DO UPDATE SET
                files = excluded.files,
                last_updated = excluded.last_updated",
            rusqlite::params![user_id, game_id, json, last_updated],
        )?;
        debug!(user = user_id, game = game_id, files = files.len(), "Stored remote manifest");
        Ok(())
    }

    fn record_completion(&self, user_id: &str, request: &CompletionRequest) -> Result<()> {
        let event = SyncEvent::new(user_id, &request.game_id, request.success)
            .with_error(request.error.clone())
            .with_uploaded(request.uploaded.clone());
        let conn = self.conn()?;
        insert_event(&conn, &event)?;
        let pruned = prune_events(&conn, user_id, &request.game_id, EVENT_HISTORY_LIMIT)?;
        if pruned > 0 {
            debug!(user = user_id, game = %request.game_id, pruned, "Pruned sync history");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileRecord;
    use tempfile::TempDir;

    fn sample() -> Manifest {
        [
            FileRecord::new("persistent", 10, 100.0, "aa"),
            FileRecord::new("1-1-LT1.save", 20, 200.5, "bb"),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_get_absent_is_empty() {
        let store = SqliteManifestStore::open_memory().unwrap();
        assert!(store.load("player", "vn").unwrap().is_none());
        assert!(store.get("player", "vn").is_empty());
    }

    #[test]
    fn test_put_then_get() {
        let store = SqliteManifestStore::open_memory().unwrap();
        store.put("player", "vn", &sample(), 1_700_000_000).unwrap();

        let loaded = store.load("player", "vn").unwrap().unwrap();
        assert_eq!(loaded.files, sample());
        assert_eq!(loaded.last_updated, 1_700_000_000);
        assert_eq!(store.get("player", "vn"), sample());
        // Other pairs are untouched
        assert!(store.get("player", "other").is_empty());
    }

    #[test]
    fn test_put_replaces_whole_manifest() {
        let store = SqliteManifestStore::open_memory().unwrap();
        store.put("player", "vn", &sample(), 1).unwrap();

        let replacement: Manifest = std::iter::once(FileRecord::new("persistent", 1, 1.0, "zz")).collect();
        store.put("player", "vn", &replacement, 2).unwrap();

        let loaded = store.load("player", "vn").unwrap().unwrap();
        assert_eq!(loaded.files, replacement);
        assert_eq!(loaded.last_updated, 2);
    }

    #[test]
    fn test_corrupt_row_degrades_to_empty() {
        let store = SqliteManifestStore::open_memory().unwrap();
        store
            .conn()
            .unwrap()
            .execute(
                "INSERT INTO manifests (user_id, game_id, files, last_updated) VALUES ('p', 'g', 'not json', 0)",
                [],
            )
            .unwrap();

        assert!(store.load("p", "g").is_err());
        assert!(store.get("p", "g").is_empty());
    }

    #[test]
    fn test_persists_across_reopen() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data").join("manifests.db");

        SqliteManifestStore::open(&path).unwrap().put("p", "g", &sample(), 5).unwrap();

        let reopened = SqliteManifestStore::open(&path).unwrap();
        assert_eq!(reopened.get("p", "g"), sample());
    }

    #[test]
    fn test_record_completion() {
        let store = SqliteManifestStore::open_memory().unwrap();
        let request = CompletionRequest {
            game_id: "vn".into(),
            success: true,
            error: None,
            uploaded: vec!["persistent".into()],
        };

        store.record_completion("p", &request).unwrap();

        let events = store.recent_events("p", "vn", None).unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].success);
        assert_eq!(events[0].uploaded, vec!["persistent".to_string()]);
    }

    #[test]
    fn test_completion_history_is_capped() {
        let store = SqliteManifestStore::open_memory().unwrap();
        let request = CompletionRequest {
            game_id: "vn".into(),
            success: true,
            ..CompletionRequest::default()
        };

        for _ in 0..EVENT_HISTORY_LIMIT + 5 {
            store.record_completion("p", &request).unwrap();
        }

        let events = store.recent_events("p", "vn", Some(EVENT_HISTORY_LIMIT * 2)).unwrap();
        assert_eq!(events.len(), EVENT_HISTORY_LIMIT as usize);
    }
}
