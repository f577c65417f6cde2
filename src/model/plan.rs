//! Action plans and the sync API wire contract.
//!
//! [`ActionPlan`] is what the reconciliation engine produces: names only, no
//! I/O. [`SyncPlan`] is the same plan after the service has attached a
//! pre-signed transfer handle to every item, as sent to the client.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use super::manifest::Manifest;

/// Which way bytes move for a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Local copy overwrites the remote one.
    Upload,
    /// Remote copy overwrites the local one.
    Download,
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Upload => write!(f, "upload"),
            Self::Download => write!(f, "download"),
        }
    }
}

impl std::str::FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "upload" => Ok(Self::Upload),
            "download" => Ok(Self::Download),
            _ => Err(format!("Unknown transfer direction: {s}")),
        }
    }
}

/// Output of reconciliation.
///
/// `conflicts` always carries a concrete resolution; `deletes` is reserved
/// and stays empty because absence is never propagated as deletion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ActionPlan {
    pub uploads: BTreeSet<String>,
    pub downloads: BTreeSet<String>,
    pub conflicts: BTreeMap<String, Direction>,
    pub deletes: BTreeSet<String>,
}

impl ActionPlan {
    /// Returns true if no set has any entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty()
            && self.downloads.is_empty()
            && self.conflicts.is_empty()
            && self.deletes.is_empty()
    }

    /// Names whose local copy will overwrite the remote one, conflicts included.
    pub fn upload_names(&self) -> impl Iterator<Item = &str> {
        self.uploads.iter().map(String::as_str).chain(
            self.conflicts
                .iter()
                .filter(|(_, d)| **d == Direction::Upload)
                .map(|(name, _)| name.as_str()),
        )
    }

    /// Total number of planned transfers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.uploads.len() + self.downloads.len() + self.conflicts.len() + self.deletes.len()
    }
}

/// A short-lived, pre-authorized capability for exactly one transfer.
///
/// Opaque to the client: usually a pre-signed URL, or a `file://` URL for
/// the filesystem blob store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferHandle(pub String);

impl TransferHandle {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Pre-signed query strings carry credentials; never print them.
        let shown = self.0.split('?').next().unwrap_or_default();
        write!(f, "{shown}")
    }
}

/// Request body for `POST /sync/plan`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncPlanRequest {
    #[serde(alias = "game_id", default)]
    pub game_id: String,
    #[serde(default)]
    pub manifest: Manifest,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadItem {
    pub filename: String,
    #[serde(alias = "upload_url")]
    pub upload_url: TransferHandle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadItem {
    pub filename: String,
    #[serde(alias = "download_url")]
    pub download_url: TransferHandle,
    /// Remote modification time, restored onto the written file when present
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<f64>,
}

/// A conflicting file together with its deterministic resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictItem {
    pub filename: String,
    pub action: Direction,
    #[serde(alias = "upload_url", default, skip_serializing_if = "Option::is_none")]
    pub upload_url: Option<TransferHandle>,
    #[serde(alias = "download_url", default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<TransferHandle>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_at: Option<f64>,
}

impl ConflictItem {
    /// The handle matching the resolved action, if the server sent one.
    #[must_use]
    pub fn handle(&self) -> Option<&TransferHandle> {
        match self.action {
            Direction::Upload => self.upload_url.as_ref(),
            Direction::Download => self.download_url.as_ref(),
        }
    }
}

/// Response body of `POST /sync/plan`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncPlan {
    #[serde(default)]
    pub uploads: Vec<UploadItem>,
    #[serde(default)]
    pub downloads: Vec<DownloadItem>,
    #[serde(default)]
    pub conflicts: Vec<ConflictItem>,
    #[serde(default)]
    pub deletes: Vec<String>,
}

impl SyncPlan {
    /// Whether any transfer needs to happen.
    #[must_use]
    pub fn has_actions(&self) -> bool {
        !(self.uploads.is_empty() && self.downloads.is_empty() && self.conflicts.is_empty())
    }
}

/// Request body for `POST /sync/complete`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    #[serde(alias = "game_id", default)]
    pub game_id: String,
    pub success: bool,
    #[serde(default)]
    pub error: Option<String>,
    /// Files whose upload actually succeeded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub uploaded: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionAck {
    pub acknowledged: bool,
}
