//! Client-side sync.
//!
//! - **Inventory**: which files in a save directory take part, and their manifest
//! - **Hashing**: chunked SHA256 content fingerprints
//! - **Reconcile**: pure local-vs-remote comparison producing an action plan
//! - **Executor**: applies a plan through a blob transport, backup-before-overwrite
//! - **Orchestrator**: throttling, re-entrancy guard, and end-to-end sequencing
//! - **Status**: terminal output for manifests, plans and reports
//!
//! # Example
//!
//! ```ignore
//! use cloudsave::sync::{LocalInventory, SyncManager};
//!
//! let sync = SyncManager::new("my-vn", LocalInventory::new(save_dir), identity, api, transport);
//! if sync.sync_on_start() {
//!     println!("synced at {:?}", sync.last_sync_time());
//! }
//! ```

pub mod executor;
pub(crate) mod file;
mod hash;
pub mod inventory;
pub mod orchestrator;
pub mod reconcile;
pub mod status;
mod types;

pub use executor::{TransferExecutor, completion_request, notify_completion};
pub use file::{BACKUP_DIR_NAME, atomic_write, validate_filename};
pub use hash::{bytes_checksum, file_checksum};
pub use inventory::{LocalInventory, PERSISTENT_FILE};
pub use orchestrator::{DEFAULT_SYNC_INTERVAL, SyncManager};
pub use reconcile::{Comparison, Reconciliation, compare, reconcile};
pub use types::{SkipReason, SyncOutcome, SyncState, SyncStatus, TransferFailure, TransferReport};
