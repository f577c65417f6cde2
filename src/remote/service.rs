//! Reconciliation service.
//!
//! The server-side half of a sync: load the stored remote manifest, run the
//! reconciliation engine against the client's manifest, attach a transfer
//! handle to every planned item, and commit the next remote manifest.
//!
//! # Commit modes
//!
//! - [`CommitMode::Eager`] writes the overlaid manifest before the plan is
//!   returned, so an upload that later fails still shows as synced.
//! - [`CommitMode::Confirmed`] holds the overlaid upload records until the
//!   client's completion lists which uploads actually landed, and commits
//!   only those.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::{HandleIssuer, SyncApi};
use crate::error::{Error, Result};
use crate::model::{
    CompletionAck, CompletionRequest, ConflictItem, Direction, DownloadItem, FileRecord, Manifest,
    SyncPlan,
    SyncPlanRequest, UploadItem,
};
use crate::storage::ManifestStore;
use crate::sync::{Reconciliation, reconcile};

/// When the remote manifest is written relative to the transfers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitMode {
    /// Persist before transfers are confirmed.
    #[default]
    Eager,
    /// Persist only uploads the client confirms.
    Confirmed,
}

impl std::fmt::Display for CommitMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Eager => write!(f, "eager"),
            Self::Confirmed => write!(f, "confirmed"),
        }
    }
}

impl std::str::FromStr for CommitMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "eager" => Ok(Self::Eager),
            "confirmed" => Ok(Self::Confirmed),
            _ => Err(Error::InvalidArgument(format!("Unknown commit mode: {s}"))),
        }
    }
}

type UnitKey = (String, String);

/// Plans and completes syncs against a manifest store and a handle issuer.
pub struct ReconcileService {
    store: Arc<dyn ManifestStore>,
    issuer: Arc<dyn HandleIssuer>,
    mode: CommitMode,
    /// Confirmed mode only: upload records awaiting the client's completion
    pending: Mutex<HashMap<UnitKey, Manifest>>,
}

impl ReconcileService {
    #[must_use]
    pub fn new(store: Arc<dyn ManifestStore>, issuer: Arc<dyn HandleIssuer>, mode: CommitMode) -> Self {
        Self {
            store,
            issuer,
            mode,
            pending: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> CommitMode {
        self.mode
    }

    /// Reconcile without issuing handles or committing anything.
    #[must_use]
    pub fn preview(&self, user_id: &str, game_id: &str, local: &Manifest) -> Reconciliation {
        reconcile(local, &self.store.get(user_id, game_id))
    }

    /// Build the plan for a client's manifest.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty game id, a storage error for an
    /// unsafe filename, or the store's error if an eager commit fails.
    pub fn plan(&self, user_id: &str, request: &SyncPlanRequest) -> Result<SyncPlan> {
        let game_id = request.game_id.as_str();
        if game_id.is_empty() {
            return Err(Error::InvalidArgument("Missing game_id".to_string()));
        }

        let remote = self.store.get(user_id, game_id);
        let reconciliation = reconcile(&request.manifest, &remote);
        let plan = self.attach_handles(user_id, game_id, &reconciliation, &remote)?;

        self.commit_plan(user_id, game_id, &reconciliation)?;

        info!(
            user = user_id,
            game = game_id,
            uploads = plan.uploads.len(),
            downloads = plan.downloads.len(),
            conflicts = plan.conflicts.len(),
            "Sync plan generated"
        );
        Ok(plan)
    }

    /// Record a client's completion notification.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty game id, or the store's error
    /// if a confirmed commit fails.
    pub fn complete(&self, user_id: &str, request: &CompletionRequest) -> Result<CompletionAck> {
        let game_id = request.game_id.as_str();
        if game_id.is_empty() {
            return Err(Error::InvalidArgument("Missing game_id".to_string()));
        }

        if request.success {
            info!(user = user_id, game = game_id, uploaded = request.uploaded.len(), "Sync completed");
        } else {
            warn!(
                user = user_id,
                game = game_id,
                error = request.error.as_deref().unwrap_or("unknown"),
                "Sync completed with failures"
            );
        }

        if let Err(e) = self.store.record_completion(user_id, request) {
            warn!(error = %e, "Failed to record sync completion");
        }

        if self.mode == CommitMode::Confirmed {
            self.commit_confirmed(user_id, game_id, &request.uploaded)?;
        }

        Ok(CompletionAck { acknowledged: true })
    }

    fn attach_handles(
        &self,
        user_id: &str,
        game_id: &str,
        reconciliation: &Reconciliation,
        remote: &Manifest,
    ) -> Result<SyncPlan> {
        let actions = &reconciliation.plan;
        let remote_time = |name: &str| remote.get(name).map(|r| r.modified_at);
        let mut plan = SyncPlan::default();

        for filename in &actions.uploads {
            plan.uploads.push(UploadItem {
                filename: filename.clone(),
                upload_url: self.issuer.issue_upload_handle(user_id, game_id, filename)?,
            });
        }

        for filename in &actions.downloads {
            plan.downloads.push(DownloadItem {
                filename: filename.clone(),
                download_url: self.issuer.issue_download_handle(user_id, game_id, filename)?,
                modified_at: remote_time(filename),
            });
        }

        for (filename, action) in &actions.conflicts {
            let mut item = ConflictItem {
                filename: filename.clone(),
                action: *action,
                upload_url: None,
                download_url: None,
                modified_at: None,
            };
            match action {
                Direction::Upload => {
                    item.upload_url = Some(self.issuer.issue_upload_handle(user_id, game_id, filename)?);
                }
                Direction::Download => {
                    item.download_url = Some(self.issuer.issue_download_handle(user_id, game_id, filename)?);
                    item.modified_at = remote_time(filename);
                }
            }
            plan.conflicts.push(item);
        }

        plan.deletes = actions.deletes.iter().cloned().collect();
        Ok(plan)
    }

    fn commit_plan(&self, user_id: &str, game_id: &str, reconciliation: &Reconciliation) -> Result<()> {
        let key = (user_id.to_string(), game_id.to_string());

        match self.mode {
            CommitMode::Eager => {
                if reconciliation.has_uploads() {
                    let now = chrono::Utc::now().timestamp();
                    self.store.put(user_id, game_id, &reconciliation.next_remote, now)?;
                    debug!(user = user_id, game = game_id, "Remote manifest committed eagerly");
                }
            }
            CommitMode::Confirmed => {
                let staged: Vec<_> = reconciliation
                    .plan
                    .upload_names()
                    .filter_map(|name| reconciliation.next_remote.get(name).cloned())
                    .collect();
                if !staged.is_empty() {
                    // Later plans add to what is already staged; a newer record for the same name wins
                    let mut pending = self.lock_pending()?;
                    let entry = pending.entry(key).or_default();
                    for record in staged {
                        entry.insert(record);
                    }
                }
            }
        }
        Ok(())
    }

    fn commit_confirmed(&self, user_id: &str, game_id: &str, uploaded: &[String]) -> Result<()> {
        let key = (user_id.to_string(), game_id.to_string());
        let confirmed: Vec<FileRecord> = {
            let mut pending = self.lock_pending()?;
            let Some(staged) = pending.get_mut(&key) else {
                return Ok(());
            };

            let mut confirmed = Vec::new();
            for name in uploaded {
                match staged.remove(name) {
                    Some(record) => confirmed.push(record),
                    None => warn!(file = %name, "Completion lists a file that was not planned for upload"),
                }
            }
            if staged.is_empty() {
                pending.remove(&key);
            }
            confirmed
        };

        if confirmed.is_empty() {
            return Ok(());
        }

        let committed = confirmed.len();
        let mut next = self.store.get(user_id, game_id);
        for record in confirmed {
            next.insert(record);
        }
        self.store.put(user_id, game_id, &next, chrono::Utc::now().timestamp())?;
        debug!(user = user_id, game = game_id, committed, "Confirmed uploads committed");
        Ok(())
    }

    fn lock_pending(&self) -> Result<std::sync::MutexGuard<'_, HashMap<UnitKey, Manifest>>> {
        self.pending
            .lock()
            .map_err(|_| Error::Other("Pending commit lock poisoned".to_string()))
    }
}

/// [`SyncApi`] served by an in-process [`ReconcileService`] for a fixed user.
pub struct LocalSyncApi {
    service: Arc<ReconcileService>,
    user_id: String,
}

impl LocalSyncApi {
    #[must_use]
    pub fn new(service: Arc<ReconcileService>, user_id: impl Into<String>) -> Self {
        Self {
            service,
            user_id: user_id.into(),
        }
    }

    #[must_use]
    pub fn service(&self) -> &ReconcileService {
        &self.service
    }
}

impl SyncApi for LocalSyncApi {
    fn request_plan(&self, game_id: &str, manifest: &Manifest) -> Result<SyncPlan> {
        let request = SyncPlanRequest {
            game_id: game_id.to_string(),
            manifest: manifest.clone(),
        };
        self.service.plan(&self.user_id, &request)
    }

    fn complete_sync(&self, request: &CompletionRequest) -> Result<CompletionAck> {
        self.service.complete(&self.user_id, request)
    }
}
