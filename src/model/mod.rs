//! Data models for cloudsave.
//!
//! This module contains the sync-relevant domain models:
//! - FileRecord / Manifest / RemoteManifest
//! - ActionPlan (reconciliation output)
//! - Wire types exchanged with the sync API

pub mod manifest;
pub mod plan;

pub use manifest::{FileRecord, Manifest, RemoteManifest};
pub use plan::{
    ActionPlan, CompletionAck, CompletionRequest, ConflictItem, Direction, DownloadItem,
    SyncPlan, SyncPlanRequest, TransferHandle, UploadItem,
};
