//! In-memory manifest store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use super::ManifestStore;
use crate::error::{Error, Result};
use crate::model::{Manifest, RemoteManifest};

/// Manifest store held in process memory.
///
/// Reads and writes can be made to fail on demand, which is how tests
/// exercise the store's degrade-on-read and fail-loudly-on-write contract.
#[derive(Debug, Default)]
pub struct InMemoryManifestStore {
    rows: Mutex<HashMap<(String, String), RemoteManifest>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
}

impl InMemoryManifestStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent `load` calls fail.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make subsequent `put` calls fail.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of stored (user, game) rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().map(|rows| rows.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ManifestStore for InMemoryManifestStore {
    fn load(&self, user_id: &str, game_id: &str) -> Result<Option<RemoteManifest>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::Storage("Manifest table unavailable".to_string()));
        }
        let rows = self
            .rows
            .lock()
            .map_err(|_| Error::Other("Manifest store lock poisoned".to_string()))?;
        Ok(rows.get(&(user_id.to_string(), game_id.to_string())).cloned())
    }

    fn put(&self, user_id: &str, game_id: &str, files: &Manifest, last_updated: i64) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(Error::Storage("Manifest table unavailable".to_string()));
        }
        let mut rows = self
            .rows
            .lock()
            .map_err(|_| Error::Other("Manifest store lock poisoned".to_string()))?;
        rows.insert(
            (user_id.to_string(), game_id.to_string()),
            RemoteManifest {
                user_id: user_id.to_string(),
                game_id: game_id.to_string(),
                files: files.clone(),
                last_updated,
            },
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::FileRecord;

    #[test]
    fn test_read_failure_degrades_to_empty() {
        let store = InMemoryManifestStore::new();
        let files: Manifest = std::iter::once(FileRecord::new("persistent", 1, 1.0, "a")).collect();
        store.put("u", "g", &files, 1).unwrap();

        store.set_fail_reads(true);
        assert!(store.load("u", "g").is_err());
        assert!(store.get("u", "g").is_empty());

        store.set_fail_reads(false);
        assert_eq!(store.get("u", "g"), files);
    }

    #[test]
    fn test_write_failure_propagates() {
        let store = InMemoryManifestStore::new();
        store.set_fail_writes(true);

        let err = store.put("u", "g", &Manifest::new(), 1).unwrap_err();
        assert!(matches!(err, Error::Storage(_)));
        assert!(store.is_empty());
    }
}
