//! Sync completion history.
//!
//! Every completion notification the reconciliation service receives is
//! recorded here so `status` can show how recent syncs went.

use rusqlite::{Connection, Result};
use serde::Serialize;

/// A recorded completion notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncEvent {
    pub id: i64,
    pub user_id: String,
    pub game_id: String,
    pub success: bool,
    pub error: Option<String>,
    pub uploaded: Vec<String>,
    /// Unix milliseconds
    pub created_at: i64,
}

impl SyncEvent {
    /// Create a new event (id will be assigned by database).
    #[must_use]
    pub fn new(user_id: &str, game_id: &str, success: bool) -> Self {
        Self {
            id: 0,
            user_id: user_id.to_string(),
            game_id: game_id.to_string(),
            success,
            error: None,
            uploaded: Vec::new(),
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    #[must_use]
    pub fn with_error(mut self, error: Option<String>) -> Self {
        self.error = error;
        self
    }

    #[must_use]
    pub fn with_uploaded(mut self, uploaded: Vec<String>) -> Self {
        self.uploaded = uploaded;
        self
    }
}

/// Insert an event into the database.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub fn insert_event(conn: &Connection, event: &SyncEvent) -> Result<i64> {
    let uploaded = serde_json::to_string(&event.uploaded)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;
    conn.execute(
        "INSERT INTO sync_events (user_id, game_id, success, error, uploaded, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            event.user_id,
            event.game_id,
            event.success,
            event.error,
            uploaded,
            event.created_at,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Delete all but the newest `keep` events for a (user, game) pair.
///
/// Returns the number of rows removed.
///
/// # Errors
///
/// Returns an error if the delete fails.
pub fn prune_events(conn: &Connection, user_id: &str, game_id: &str, keep: u32) -> Result<usize> {
    conn.execute(
        "DELETE FROM sync_events
         WHERE user_id = ?1 AND game_id = ?2
           AND id NOT IN (
             SELECT id FROM sync_events
             WHERE user_id = ?1 AND game_id = ?2
             ORDER BY created_at DESC, id DESC
             LIMIT ?3
           )",
        rusqlite::params![user_id, game_id, keep],
    )
}

/// Most recent events for a (user, game) pair, newest first.
///
/// # Errors
///
/// Returns an error if the query fails.
pub fn recent_events(
    conn: &Connection,
    user_id: &str,
    game_id: &str,
    limit: Option<u32>,
) -> Result<Vec<SyncEvent>> {
    let limit = limit.unwrap_or(20);
    let mut stmt = conn.prepare(
        "SELECT id, user_id, game_id, success, error, uploaded, created_at
         FROM sync_events
         WHERE user_id = ?1 AND game_id = ?2
         ORDER BY created_at DESC, id DESC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(rusqlite::params![user_id, game_id, limit], |row| {
        let uploaded: String = row.get(5)?;
        Ok(SyncEvent {
            id: row.get(0)?,
            user_id: row.get(1)?,
            game_id: row.get(2)?,
            success: row.get(3)?,
            error: row.get(4)?,
            uploaded: serde_json::from_str(&uploaded).unwrap_or_default(),
            created_at: row.get(6)?,
        })
    })?;

    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::schema::apply_schema;

    #[test]
    fn test_event_insert_and_get() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        let event = SyncEvent::new("player", "vn", false)
            .with_error(Some("persistent: Upload failed (403)".into()))
            .with_uploaded(vec!["1-1-LT1.save".into()]);

        let id = insert_event(&conn, &event).unwrap();
        assert!(id > 0);

        let events = recent_events(&conn, "player", "vn", Some(10)).unwrap();
        assert_eq!(events.len(), 1);
        assert!(!events[0].success);
        assert_eq!(events[0].uploaded, vec!["1-1-LT1.save".to_string()]);
        assert_eq!(events[0].error.as_deref(), Some("persistent: Upload failed (403)"));
    }

    #[test]
    fn test_events_scoped_to_unit() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        insert_event(&conn, &SyncEvent::new("a", "vn", true)).unwrap();
        insert_event(&conn, &SyncEvent::new("b", "vn", true)).unwrap();

        assert_eq!(recent_events(&conn, "a", "vn", None).unwrap().len(), 1);
        assert!(recent_events(&conn, "a", "other", None).unwrap().is_empty());
    }

    #[test]
    fn test_prune_keeps_newest() {
        let conn = Connection::open_in_memory().unwrap();
        apply_schema(&conn).unwrap();

        for i in 0..5 {
            let mut event = SyncEvent::new("a", "vn", true);
            event.created_at = 1_000 + i;
            insert_event(&conn, &event).unwrap();
        }
        insert_event(&conn, &SyncEvent::new("b", "vn", true)).unwrap();

        assert_eq!(prune_events(&conn, "a", "vn", 2).unwrap(), 3);

        let kept = recent_events(&conn, "a", "vn", None).unwrap();
        assert_eq!(kept.iter().map(|e| e.created_at).collect::<Vec<_>>(), vec![1_004, 1_003]);
        // Other units untouched
        assert_eq!(recent_events(&conn, "b", "vn", None).unwrap().len(), 1);
    }
}
