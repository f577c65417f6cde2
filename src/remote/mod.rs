//! The seam between a sync client and the reconciliation service.
//!
//! The orchestrator talks to a [`SyncApi`] and moves bytes through a
//! [`BlobTransport`]; the service side issues handles through a
//! [`HandleIssuer`]. Each seam has an in-process implementation (used by
//! the `local` backend and tests) and an HTTP one.
//!
//! # Submodules
//!
//! - [`service`] - reconciliation service: plan, completion, commit modes
//! - [`http`] - HTTP sync API client and pre-signed URL transport

pub mod http;
pub mod service;

pub use http::{HttpSyncApi, HttpTransport};
pub use service::{CommitMode, LocalSyncApi, ReconcileService};

use crate::error::{Error, Result};
use crate::model::{CompletionAck, CompletionRequest, Manifest, SyncPlan, TransferHandle};
use crate::storage::FsBlobStore;

/// Client view of the reconciliation service.
pub trait SyncApi: Send + Sync {
    /// Send the local manifest and receive a plan with transfer handles.
    ///
    /// # Errors
    ///
    /// Returns an error if the service cannot be reached or rejects the request.
    fn request_plan(&self, game_id: &str, manifest: &Manifest) -> Result<SyncPlan>;

    /// Report the outcome of applying a plan.
    ///
    /// # Errors
    ///
    /// Returns an error if the notification fails. Senders ignore it.
    fn complete_sync(&self, request: &CompletionRequest) -> Result<CompletionAck>;
}

/// Issues single-use transfer handles for blob keys.
pub trait HandleIssuer: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the filename is unsafe or signing fails.
    fn issue_upload_handle(&self, user_id: &str, game_id: &str, filename: &str) -> Result<TransferHandle>;

    /// # Errors
    ///
    /// Returns an error if the filename is unsafe or signing fails.
    fn issue_download_handle(&self, user_id: &str, game_id: &str, filename: &str) -> Result<TransferHandle>;
}

/// Moves raw bytes through a transfer handle.
pub trait BlobTransport: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the write is rejected or the transport fails.
    fn write_via_handle(&self, handle: &TransferHandle, bytes: &[u8]) -> Result<()>;

    /// # Errors
    ///
    /// Returns an error if the read is rejected or the transport fails.
    fn read_via_handle(&self, handle: &TransferHandle) -> Result<Vec<u8>>;
}

/// Routes `file://` handles to a filesystem store and everything else to HTTP.
#[derive(Debug, Clone)]
pub struct DispatchTransport {
    files: Option<FsBlobStore>,
    http: HttpTransport,
}

impl DispatchTransport {
    #[must_use]
    pub fn new(files: Option<FsBlobStore>, http: HttpTransport) -> Self {
        Self { files, http }
    }

    fn files_for(&self, handle: &TransferHandle) -> Result<&FsBlobStore> {
        self.files
            .as_ref()
            .ok_or_else(|| Error::Storage(format!("No filesystem blob store for handle {handle}")))
    }
}

impl BlobTransport for DispatchTransport {
    fn write_via_handle(&self, handle: &TransferHandle, bytes: &[u8]) -> Result<()> {
        if FsBlobStore::owns(handle) {
            self.files_for(handle)?.write_via_handle(handle, bytes)
        } else {
            self.http.write_via_handle(handle, bytes)
        }
    }

    fn read_via_handle(&self, handle: &TransferHandle) -> Result<Vec<u8>> {
        if FsBlobStore::owns(handle) {
            self.files_for(handle)?.read_via_handle(handle)
        } else {
            self.http.read_via_handle(handle)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_dispatch_routes_file_handles() {
        let temp_dir = TempDir::new().unwrap();
        let files = FsBlobStore::open(temp_dir.path()).unwrap();
        let handle = files.issue_upload_handle("u", "g", "persistent").unwrap();
        let transport = DispatchTransport::new(Some(files), HttpTransport::new(Duration::from_secs(1)).unwrap());

        transport.write_via_handle(&handle, b"bytes").unwrap();
        assert_eq!(transport.read_via_handle(&handle).unwrap(), b"bytes");
    }

    #[test]
    fn test_dispatch_without_store_rejects_file_handles() {
        let transport = DispatchTransport::new(None, HttpTransport::new(Duration::from_secs(1)).unwrap());
        let handle = TransferHandle("file:///tmp/blob".into());

        assert!(matches!(transport.read_via_handle(&handle), Err(Error::Storage(_))));
    }

    #[test]
    fn test_dispatch_routes_http_handles() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/bucket/persistent")
            .with_status(200)
            .with_body("remote bytes")
            .create();

        let transport = DispatchTransport::new(None, HttpTransport::new(Duration::from_secs(5)).unwrap());
        let handle = TransferHandle(format!("{}/bucket/persistent", server.url()));

        assert_eq!(transport.read_via_handle(&handle).unwrap(), b"remote bytes");
        mock.assert();
    }
}
