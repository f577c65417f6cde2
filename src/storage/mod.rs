//! Remote manifest and blob storage.
//!
//! The reconciliation service only needs two things from storage: a
//! key-value store holding the last-known remote manifest per (user, game),
//! and a blob store that can issue single-use transfer handles.
//!
//! # Submodules
//!
//! - [`schema`] - SQLite schema for the manifest store
//! - [`sqlite`] - SQLite-backed [`ManifestStore`]
//! - [`memory`] - in-memory [`ManifestStore`] for tests and embedding
//! - [`events`] - completion history
//! - [`blob`] - filesystem blob store with `file://` handles

pub mod blob;
pub mod events;
pub mod memory;
pub mod schema;
pub mod sqlite;

pub use blob::FsBlobStore;
pub use events::SyncEvent;
pub use memory::InMemoryManifestStore;
pub use sqlite::SqliteManifestStore;

use tracing::warn;

use crate::error::Result;
use crate::model::{CompletionRequest, Manifest, RemoteManifest};

/// Durable store for remote manifests, keyed by (user, game).
///
/// Implementors provide [`load`](Self::load) and [`put`](Self::put); the
/// provided [`get`](Self::get) is what reconciliation uses.
pub trait ManifestStore: Send + Sync {
    /// Load the stored record, `None` if the pair has never been written.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn load(&self, user_id: &str, game_id: &str) -> Result<Option<RemoteManifest>>;

    /// Replace the stored manifest for the pair.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails. Callers must not swallow it.
    fn put(&self, user_id: &str, game_id: &str, files: &Manifest, last_updated: i64) -> Result<()>;

    /// Record a completion notification. Stores without history ignore it.
    ///
    /// # Errors
    ///
    /// Returns an error if the history write fails.
    fn record_completion(&self, _user_id: &str, _request: &CompletionRequest) -> Result<()> {
        Ok(())
    }

    /// Stored manifest for the pair; empty if absent or unreadable.
    fn get(&self, user_id: &str, game_id: &str) -> Manifest {
        match self.load(user_id, game_id) {
            Ok(Some(record)) => record.files,
            Ok(None) => Manifest::new(),
            Err(e) => {
                warn!(user = user_id, game = game_id, error = %e, "Manifest read failed; treating as empty");
                Manifest::new()
            }
        }
    }
}
