//! Filesystem blob store.
//!
//! Stands in for object storage on the `local` backend. Blobs live under
//! `<root>/users/<user>/games/<game>/<filename>` and handles are `file://`
//! URLs pointing at them, so the executor moves bytes the same way it would
//! through pre-signed URLs.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

use crate::error::{Error, Result};
use crate::model::TransferHandle;
use crate::remote::{BlobTransport, HandleIssuer};
use crate::sync::{atomic_write, validate_filename};

/// Scheme prefix of handles issued by [`FsBlobStore`].
pub const FILE_SCHEME: &str = "file://";

/// Object key for one file of one (user, game) pair.
///
/// # Errors
///
/// Returns `Error::Storage` if any component is not a plain name.
pub fn blob_key(user_id: &str, game_id: &str, filename: &str) -> Result<String> {
    validate_filename(user_id)?;
    validate_filename(game_id)?;
    validate_filename(filename)?;
    Ok(format!("users/{user_id}/games/{game_id}/{filename}"))
}

/// Blob store rooted at a local directory.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the directory cannot be created or resolved.
    pub fn open(root: &Path) -> Result<Self> {
        fs::create_dir_all(root).map_err(|e| {
            Error::Storage(format!("Failed to create blob directory {}: {e}", root.display()))
        })?;
        let root = root.canonicalize().map_err(|e| {
            Error::Storage(format!("Failed to resolve blob directory {}: {e}", root.display()))
        })?;
        Ok(Self { root })
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a handle was issued by a filesystem store.
    #[must_use]
    pub fn owns(handle: &TransferHandle) -> bool {
        handle.as_str().starts_with(FILE_SCHEME)
    }

    fn issue(&self, user_id: &str, game_id: &str, filename: &str) -> Result<TransferHandle> {
        let path = self.root.join(blob_key(user_id, game_id, filename)?);
        Ok(TransferHandle(format!("{FILE_SCHEME}{}", path.display())))
    }

    /// Resolve a handle to a path inside the root.
    fn resolve(&self, handle: &TransferHandle) -> Result<PathBuf> {
        let raw = handle
            .as_str()
            .strip_prefix(FILE_SCHEME)
            .ok_or_else(|| Error::Storage(format!("Not a file handle: {handle}")))?;
        let path = PathBuf::from(raw);

        let escapes = path.components().any(|c| matches!(c, Component::ParentDir));
        if escapes || !path.starts_with(&self.root) {
            return Err(Error::Storage(format!("Handle outside blob store: {handle}")));
        }
        Ok(path)
    }
}

impl HandleIssuer for FsBlobStore {
    fn issue_upload_handle(&self, user_id: &str, game_id: &str, filename: &str) -> Result<TransferHandle> {
        self.issue(user_id, game_id, filename)
    }

    fn issue_download_handle(&self, user_id: &str, game_id: &str, filename: &str) -> Result<TransferHandle> {
        self.issue(user_id, game_id, filename)
    }
}

impl BlobTransport for FsBlobStore {
    fn write_via_handle(&self, handle: &TransferHandle, bytes: &[u8]) -> Result<()> {
        let path = self.resolve(handle)?;
        atomic_write(&path, bytes)?;
        debug!(blob = %path.display(), bytes = bytes.len(), "Stored blob");
        Ok(())
    }

    fn read_via_handle(&self, handle: &TransferHandle) -> Result<Vec<u8>> {
        let path = self.resolve(handle)?;
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => Error::Sync(format!("Download failed (not found): {handle}")),
            _ => Error::Storage(format!("Failed to read blob {}: {e}", path.display())),
        })
    }
}
