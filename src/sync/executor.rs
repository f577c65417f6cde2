//! Transfer executor.
//!
//! Applies a [`SyncPlan`] item by item. Every upload, download and conflict
//! resolution is attempted independently; a failure is logged, recorded in
//! the [`TransferReport`], and the next item runs. Downloads always back up
//! an existing local file before overwriting it.

use tracing::{debug, info, warn};

use super::inventory::LocalInventory;
use super::types::TransferReport;
use crate::error::{Error, Result};
use crate::model::{CompletionRequest, Direction, SyncPlan, TransferHandle};
use crate::remote::{BlobTransport, SyncApi};

/// Moves bytes between a save directory and blob storage.
pub struct TransferExecutor<'a> {
    inventory: &'a LocalInventory,
    transport: &'a dyn BlobTransport,
}

impl<'a> TransferExecutor<'a> {
    #[must_use]
    pub fn new(inventory: &'a LocalInventory, transport: &'a dyn BlobTransport) -> Self {
        Self { inventory, transport }
    }

    /// Apply every item of the plan, sequentially. Never fails as a whole.
    #[must_use]
    pub fn apply_plan(&self, plan: &SyncPlan) -> TransferReport {
        let mut report = TransferReport::default();

        for item in &plan.uploads {
            match self.upload(&item.filename, &item.upload_url) {
                Ok(()) => report.uploaded.push(item.filename.clone()),
                Err(e) => {
                    warn!(file = %item.filename, error = %e, "Upload failed");
                    report.fail(&item.filename, e);
                }
            }
        }

        for item in &plan.downloads {
            match self.download(&item.filename, &item.download_url, item.modified_at) {
                Ok(()) => report.downloaded.push(item.filename.clone()),
                Err(e) => {
                    warn!(file = %item.filename, error = %e, "Download failed");
                    report.fail(&item.filename, e);
                }
            }
        }

        for item in &plan.conflicts {
            let result = item
                .handle()
                .ok_or_else(|| Error::Sync(format!("No {} handle for conflict", item.action)))
                .and_then(|handle| match item.action {
                    Direction::Upload => self.upload(&item.filename, handle),
                    Direction::Download => self.download(&item.filename, handle, item.modified_at),
                });

            match result {
                Ok(()) => {
                    info!(file = %item.filename, resolution = %item.action, "Conflict resolved");
                    match item.action {
                        Direction::Upload => report.uploaded.push(item.filename.clone()),
                        Direction::Download => report.downloaded.push(item.filename.clone()),
                    }
                    report.conflicts_resolved.push(item.filename.clone());
                }
                Err(e) => {
                    warn!(file = %item.filename, error = %e, "Conflict resolution failed");
                    report.fail(&item.filename, e);
                }
            }
        }

        report
    }

    fn upload(&self, filename: &str, handle: &TransferHandle) -> Result<()> {
        let content = self.inventory.read_file(filename)?;
        self.transport.write_via_handle(handle, &content)?;
        debug!(file = filename, bytes = content.len(), "Uploaded");
        Ok(())
    }

    fn download(&self, filename: &str, handle: &TransferHandle, modified_at: Option<f64>) -> Result<()> {
        // Validate before fetching so an unsafe name never costs a transfer
        self.inventory.full_path(filename)?;
        let content = self.transport.read_via_handle(handle)?;
        let backup = self.inventory.write_file(filename, &content, modified_at)?;
        debug!(
            file = filename,
            bytes = content.len(),
            backup = ?backup.map(|p| p.display().to_string()),
            "Downloaded"
        );
        Ok(())
    }
}

/// Completion notification describing a transfer report.
#[must_use]
pub fn completion_request(game_id: &str, report: &TransferReport) -> CompletionRequest {
    CompletionRequest {
        game_id: game_id.to_string(),
        success: report.is_success(),
        error: report.error_summary(),
        uploaded: report.uploaded.clone(),
    }
}

/// Tell the service how the transfers went. Failures are logged and dropped.
pub fn notify_completion(api: &dyn SyncApi, game_id: &str, report: &TransferReport) {
    match api.complete_sync(&completion_request(game_id, report)) {
        Ok(ack) => debug!(acknowledged = ack.acknowledged, "Completion reported"),
        Err(e) => warn!(error = %e, "Failed to report sync completion"),
    }
}
