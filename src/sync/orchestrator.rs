//! Sync orchestrator.
//!
//! [`SyncManager`] owns the sync state for one (user, game, save directory)
//! triple and sequences a run: build the local manifest, request a plan,
//! apply it, report completion.
//!
//! # State machine
//!
//! ```text
//! Idle ──(authenticated, interval elapsed or forced, not running)──▶ Running
//! Running ──(always, even on error)──▶ Idle
//! ```
//!
//! Guards are checked in order: authentication, throttle, re-entrancy. A
//! call that fails a guard returns immediately; concurrent calls are
//! coalesced, never queued. Errors inside a run are logged and turned into
//! [`SkipReason::Failed`]; nothing propagates to the caller.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, info_span};

use super::executor::{TransferExecutor, notify_completion};
use super::inventory::LocalInventory;
use super::types::{SkipReason, SyncOutcome, SyncState, SyncStatus, TransferReport};
use crate::auth::IdentityProvider;
use crate::error::Result;
use crate::remote::{BlobTransport, SyncApi};

/// Default minimum time between unforced syncs.
pub const DEFAULT_SYNC_INTERVAL: Duration = Duration::from_secs(300);

/// Clears the running flag when a run ends, however it ends.
struct RunningGuard<'a>(&'a AtomicBool);

impl<'a> RunningGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for RunningGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Short correlation id for one sync attempt.
fn attempt_id() -> String {
    let mut id = uuid::Uuid::new_v4().simple().to_string();
    id.truncate(8);
    id
}

/// Orchestrates syncs for one save directory.
pub struct SyncManager {
    game_id: String,
    inventory: LocalInventory,
    identity: Arc<dyn IdentityProvider>,
    api: Arc<dyn SyncApi>,
    transport: Arc<dyn BlobTransport>,
    interval: Duration,
    running: AtomicBool,
    last_sync: Mutex<Option<DateTime<Utc>>>,
}

impl SyncManager {
    #[must_use]
    pub fn new(
        game_id: impl Into<String>,
        inventory: LocalInventory,
        identity: Arc<dyn IdentityProvider>,
        api: Arc<dyn SyncApi>,
        transport: Arc<dyn BlobTransport>,
    ) -> Self {
        Self {
            game_id: game_id.into(),
            inventory,
            identity,
            api,
            transport,
            interval: DEFAULT_SYNC_INTERVAL,
            running: AtomicBool::new(false),
            last_sync: Mutex::new(None),
        }
    }

    /// Set the minimum time between unforced syncs.
    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    #[must_use]
    pub fn inventory(&self) -> &LocalInventory {
        &self.inventory
    }

    #[must_use]
    pub fn state(&self) -> SyncState {
        if self.running.load(Ordering::Acquire) {
            SyncState::Running
        } else {
            SyncState::Idle
        }
    }

    /// When the last successful sync finished.
    #[must_use]
    pub fn last_sync_time(&self) -> Option<DateTime<Utc>> {
        self.last_sync.lock().ok().and_then(|t| *t)
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            state: self.state(),
            last_sync_time: self.last_sync_time(),
        }
    }

    /// Sync unless throttled; for the host's start hook.
    pub fn sync_on_start(&self) -> bool {
        self.sync(false)
    }

    /// Always attempt a sync; for the host's quit hook.
    pub fn sync_on_quit(&self) -> bool {
        self.sync(true)
    }

    /// Always attempt a sync.
    pub fn force_sync(&self) -> bool {
        self.sync(true)
    }

    /// Run a sync and report only whether it was performed.
    pub fn sync(&self, force: bool) -> bool {
        self.run(force).performed()
    }

    /// Run a sync if the guards allow it.
    pub fn run(&self, force: bool) -> SyncOutcome {
        if !self.identity.is_authenticated() {
            debug!("Not authenticated; skipping sync");
            return SyncOutcome::NotPerformed { reason: SkipReason::NotAuthenticated };
        }

        if !force && !self.interval_elapsed() {
            debug!("Sync interval not elapsed; skipping");
            return SyncOutcome::NotPerformed { reason: SkipReason::Throttled };
        }

        let Some(_guard) = RunningGuard::acquire(&self.running) else {
            debug!("Sync already in progress; skipping");
            return SyncOutcome::NotPerformed { reason: SkipReason::AlreadyRunning };
        };

        let span = info_span!("sync", id = %attempt_id(), game = %self.game_id);
        let _enter = span.enter();

        match self.perform() {
            Ok(report) => {
                if let Ok(mut last) = self.last_sync.lock() {
                    *last = Some(Utc::now());
                }
                info!(
                    uploaded = report.uploaded.len(),
                    downloaded = report.downloaded.len(),
                    conflicts = report.conflicts_resolved.len(),
                    failed = report.failed.len(),
                    "Sync finished"
                );
                SyncOutcome::Performed { report }
            }
            Err(e) => {
                error!(error = %e, "Sync failed");
                SyncOutcome::NotPerformed { reason: SkipReason::Failed(e.to_string()) }
            }
        }
    }

    fn interval_elapsed(&self) -> bool {
        match self.last_sync_time() {
            None => true,
            Some(last) => (Utc::now() - last)
                .to_std()
                .is_ok_and(|elapsed| elapsed >= self.interval),
        }
    }

    fn perform(&self) -> Result<TransferReport> {
        let manifest = self.inventory.build_local_manifest();
        info!(files = manifest.len(), "Local manifest built");

        let plan = self.api.request_plan(&self.game_id, &manifest)?;
        if !plan.has_actions() {
            info!("Already in sync");
            return Ok(TransferReport::default());
        }

        let report = TransferExecutor::new(&self.inventory, self.transport.as_ref()).apply_plan(&plan);
        notify_completion(self.api.as_ref(), &self.game_id, &report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalIdentity;
    use crate::error::Error;
    use crate::model::{CompletionAck, CompletionRequest, Manifest, SyncPlan, UploadItem};
    use crate::remote::{CommitMode, HandleIssuer, LocalSyncApi, ReconcileService};
    use crate::storage::{FsBlobStore, InMemoryManifestStore, ManifestStore};
    use crate::sync::file::set_modified;
    use std::fs;
    use std::sync::mpsc;
    use tempfile::TempDir;

    struct NoIdentity;

    impl IdentityProvider for NoIdentity {
        fn is_authenticated(&self) -> bool {
            false
        }

        fn access_token(&self) -> Result<String> {
            Err(Error::Authentication("Not authenticated. Please log in.".into()))
        }
    }

    /// Serves a fixed plan and records completions.
    #[derive(Default)]
    struct ScriptedApi {
        plan: SyncPlan,
        fail_plan: bool,
        plans: Mutex<Vec<Manifest>>,
        completions: Mutex<Vec<CompletionRequest>>,
    }

    impl SyncApi for ScriptedApi {
        fn request_plan(&self, _: &str, manifest: &Manifest) -> Result<SyncPlan> {
            self.plans.lock().unwrap().push(manifest.clone());
            if self.fail_plan {
                return Err(Error::Network("connection refused".into()));
            }
            Ok(self.plan.clone())
        }

        fn complete_sync(&self, request: &CompletionRequest) -> Result<CompletionAck> {
            self.completions.lock().unwrap().push(request.clone());
            Ok(CompletionAck { acknowledged: true })
        }
    }

    /// Blocks inside `request_plan` until released.
    struct BlockingApi {
        entered: mpsc::Sender<()>,
        release: Mutex<mpsc::Receiver<()>>,
    }

    impl SyncApi for BlockingApi {
        fn request_plan(&self, _: &str, _: &Manifest) -> Result<SyncPlan> {
            self.entered.send(()).unwrap();
            self.release.lock().unwrap().recv().unwrap();
            Ok(SyncPlan::default())
        }

        fn complete_sync(&self, _: &CompletionRequest) -> Result<CompletionAck> {
            Ok(CompletionAck { acknowledged: true })
        }
    }

    fn blob_store(temp: &TempDir) -> Arc<FsBlobStore> {
        Arc::new(FsBlobStore::open(&temp.path().join("blobs")).unwrap())
    }

    fn manager(temp: &TempDir, api: Arc<dyn SyncApi>) -> SyncManager {
        let saves = temp.path().join("saves");
        fs::create_dir_all(&saves).unwrap();
        SyncManager::new(
            "vn",
            LocalInventory::new(saves),
            Arc::new(LocalIdentity::new("player")),
            api,
            blob_store(temp),
        )
    }

    #[test]
    fn test_unauthenticated_skips_without_planning() {
        let temp = TempDir::new().unwrap();
        let api = Arc::new(ScriptedApi::default());
        let mut sync = manager(&temp, api.clone());
        sync.identity = Arc::new(NoIdentity);

        let outcome = sync.run(true);

        assert_eq!(outcome, SyncOutcome::NotPerformed { reason: SkipReason::NotAuthenticated });
        assert!(api.plans.lock().unwrap().is_empty());
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[test]
    fn test_second_unforced_call_is_throttled() {
        let temp = TempDir::new().unwrap();
        let sync = manager(&temp, Arc::new(ScriptedApi::default())).with_interval(Duration::from_secs(300));

        assert!(sync.sync_on_start());
        let first = sync.last_sync_time();
        assert!(first.is_some());

        assert_eq!(sync.run(false), SyncOutcome::NotPerformed { reason: SkipReason::Throttled });
        assert_eq!(sync.last_sync_time(), first);

        // Forcing bypasses the throttle
        assert!(sync.force_sync());
    }

    #[test]
    fn test_zero_interval_never_throttles() {
        let temp = TempDir::new().unwrap();
        let sync = manager(&temp, Arc::new(ScriptedApi::default())).with_interval(Duration::ZERO);

        assert!(sync.sync(false));
        assert!(sync.sync(false));
    }

    #[test]
    fn test_reentrant_call_is_coalesced() {
        let temp = TempDir::new().unwrap();
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel();
        let api = Arc::new(BlockingApi {
            entered: entered_tx,
            release: Mutex::new(release_rx),
        });
        let sync = Arc::new(manager(&temp, api));

        let background = {
            let sync = Arc::clone(&sync);
            std::thread::spawn(move || sync.run(true))
        };

        entered_rx.recv().unwrap();
        assert_eq!(sync.state(), SyncState::Running);
        assert_eq!(sync.run(true), SyncOutcome::NotPerformed { reason: SkipReason::AlreadyRunning });

        release_tx.send(()).unwrap();
        let outcome = background.join().unwrap();

        assert!(outcome.performed());
        assert_eq!(sync.state(), SyncState::Idle);
    }

    #[test]
    fn test_failure_is_contained_and_releases_guard() {
        let temp = TempDir::new().unwrap();
        let api = Arc::new(ScriptedApi { fail_plan: true, ..ScriptedApi::default() });
        let sync = manager(&temp, api.clone());

        let outcome = sync.run(true);

        match outcome {
            SyncOutcome::NotPerformed { reason: SkipReason::Failed(msg) } => {
                assert!(msg.contains("connection refused"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sync.state(), SyncState::Idle);
        assert!(sync.last_sync_time().is_none());
        // The guard was released, so a retry runs
        assert!(!sync.sync(true));
        assert_eq!(api.plans.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_partial_transfer_failure_still_performed() {
        let temp = TempDir::new().unwrap();
        let blobs = blob_store(&temp);
        let handle = |name: &str| blobs.issue_upload_handle("player", "vn", name).unwrap();
        let api = Arc::new(ScriptedApi {
            plan: SyncPlan {
                uploads: vec![
                    UploadItem { filename: "9-1-LT1.save".into(), upload_url: handle("9-1-LT1.save") },
                    UploadItem { filename: "persistent".into(), upload_url: handle("persistent") },
                ],
                ..SyncPlan::default()
            },
            ..ScriptedApi::default()
        });
        let sync = manager(&temp, api.clone());
        fs::write(sync.inventory().save_dir().join("persistent"), b"p").unwrap();

        let outcome = sync.run(true);

        let SyncOutcome::Performed { report } = outcome else {
            panic!("expected a performed sync");
        };
        assert_eq!(report.uploaded, vec!["persistent".to_string()]);
        assert_eq!(report.failed.len(), 1);
        let completions = api.completions.lock().unwrap();
        assert_eq!(completions.len(), 1);
        assert!(!completions[0].success);
    }

    #[test]
    fn test_empty_local_manifest_still_requests_plan() {
        let temp = TempDir::new().unwrap();
        let api = Arc::new(ScriptedApi::default());
        let sync = manager(&temp, api.clone());

        assert!(sync.force_sync());

        let plans = api.plans.lock().unwrap();
        assert_eq!(plans.len(), 1);
        assert!(plans[0].is_empty());
        // Nothing to do, so no completion is sent
        assert!(api.completions.lock().unwrap().is_empty());
    }

    #[test]
    fn test_two_devices_converge_through_local_backend() {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(InMemoryManifestStore::new());
        let blobs = blob_store(&temp);
        let service = Arc::new(ReconcileService::new(store.clone(), blobs.clone(), CommitMode::Eager));
        let api: Arc<dyn SyncApi> = Arc::new(LocalSyncApi::new(service, "player"));

        let device = |name: &str| {
            let dir = temp.path().join(name);
            fs::create_dir_all(&dir).unwrap();
            SyncManager::new(
                "vn",
                LocalInventory::new(&dir),
                Arc::new(LocalIdentity::new("player")),
                Arc::clone(&api),
                blobs.clone(),
            )
        };
        let laptop = device("laptop");
        let desktop = device("desktop");

        let save = laptop.inventory().save_dir().join("2-1-LT1.save");
        fs::write(&save, b"chapter two").unwrap();
        set_modified(&save, 1_700_000_000.0).unwrap();
        fs::write(laptop.inventory().save_dir().join("persistent"), b"flags").unwrap();

        let SyncOutcome::Performed { report } = laptop.run(true) else {
            panic!("laptop sync not performed");
        };
        assert_eq!(report.uploaded.len(), 2);
        assert_eq!(store.get("player", "vn").len(), 2);

        let SyncOutcome::Performed { report } = desktop.run(true) else {
            panic!("desktop sync not performed");
        };
        assert_eq!(report.downloaded.len(), 2);
        let pulled = desktop.inventory().save_dir().join("2-1-LT1.save");
        assert_eq!(fs::read(&pulled).unwrap(), b"chapter two");

        // Restored mtimes make the next round a no-op on both sides
        let SyncOutcome::Performed { report } = desktop.run(true) else {
            panic!("desktop resync not performed");
        };
        assert_eq!(report, TransferReport::default());
        let SyncOutcome::Performed { report } = laptop.run(true) else {
            panic!("laptop resync not performed");
        };
        assert_eq!(report, TransferReport::default());
    }
}
