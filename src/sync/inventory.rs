//! Local file inventory.
//!
//! Decides which files in a save directory take part in sync and builds the
//! local manifest for them. Exactly two categories are tracked:
//!
//! - the `persistent` file (cross-save player data), if present
//! - every file of the most recently written save slot
//!
//! A save slot is the numeric prefix before the first `-` of a `.save` file
//! name (`3-1-LT1.save` is slot 3). The newest slot is the one owning the
//! `.save` file with the greatest modification time. Once chosen, every
//! non-hidden file starting with `<slot>-` belongs to it.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::model::{FileRecord, Manifest};
use crate::sync::file::{modified_seconds, validate_filename, write_with_backup, BACKUP_DIR_NAME};
use crate::sync::hash::file_checksum;

/// Fixed name of the persistent data file.
pub const PERSISTENT_FILE: &str = "persistent";

/// Extension of files that identify a save slot.
pub const SAVE_EXTENSION: &str = ".save";

/// Separator between the slot number and the rest of a save file name.
const SLOT_SEPARATOR: char = '-';

/// Parse the slot number from a save file name (`"12-3-LT1.save"` → 12).
fn parse_slot(file_name: &str) -> Option<u64> {
    let prefix = file_name.split(SLOT_SEPARATOR).next()?;
    prefix.parse().ok()
}

fn is_hidden(file_name: &str) -> bool {
    file_name.starts_with('.')
}

/// Inventory of one save directory.
#[derive(Debug, Clone)]
pub struct LocalInventory {
    save_dir: PathBuf,
    backup_dir: PathBuf,
}

impl LocalInventory {
    /// Create an inventory for `save_dir`; backups go to `<save_dir>/.cloudsave_backups`.
    pub fn new(save_dir: impl Into<PathBuf>) -> Self {
        let save_dir = save_dir.into();
        let backup_dir = save_dir.join(BACKUP_DIR_NAME);
        Self { save_dir, backup_dir }
    }

    #[must_use]
    pub fn save_dir(&self) -> &Path {
        &self.save_dir
    }

    #[must_use]
    pub fn backup_dir(&self) -> &Path {
        &self.backup_dir
    }

    /// Resolve a bare file name inside the save directory.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the name could escape the directory.
    pub fn full_path(&self, filename: &str) -> Result<PathBuf> {
        validate_filename(filename)?;
        Ok(self.save_dir.join(filename))
    }

    /// Build the metadata record for one file, hashing its full contents.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the file cannot be stat'ed or read.
    pub fn file_record(&self, path: &Path) -> Result<FileRecord> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| Error::Storage(format!("Unusable file name: {}", path.display())))?;

        let meta = fs::metadata(path).map_err(|e| {
            Error::Storage(format!("Failed to get file info for {}: {e}", path.display()))
        })?;
        let modified = meta.modified().map_err(|e| {
            Error::Storage(format!("Failed to get file info for {}: {e}", path.display()))
        })?;
        let checksum = file_checksum(path)
            .map_err(|e| Error::Storage(format!("Failed to hash file {}: {e}", path.display())))?;

        Ok(FileRecord::new(name, meta.len(), modified_seconds(modified), checksum))
    }

    /// Regular, visible, UTF-8 named files directly inside the save directory.
    fn visible_files(&self) -> Vec<(String, PathBuf, fs::Metadata)> {
        let entries = match fs::read_dir(&self.save_dir) {
            Ok(entries) => entries,
            Err(e) => {
                if self.save_dir.exists() {
                    warn!(dir = %self.save_dir.display(), error = %e, "Failed to scan save directory");
                }
                return Vec::new();
            }
        };

        entries
            .filter_map(std::result::Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().to_str()?.to_string();
                if is_hidden(&name) {
                    return None;
                }
                let meta = fs::metadata(entry.path()).ok()?;
                meta.is_file().then(|| (name, entry.path(), meta))
            })
            .collect()
    }

    /// The slot owning the most recently modified `.save` file.
    ///
    /// Files whose prefix is not a number are ignored. Equal modification
    /// times resolve to the higher slot number.
    #[must_use]
    pub fn most_recent_slot(&self) -> Option<u64> {
        self.visible_files()
            .into_iter()
            .filter(|(name, _, _)| name.ends_with(SAVE_EXTENSION))
            .filter_map(|(name, _, meta)| {
                let slot = parse_slot(&name)?;
                let mtime = modified_seconds(meta.modified().ok()?);
                Some((slot, mtime))
            })
            .max_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)))
            .map(|(slot, _)| slot)
    }

    /// All visible files belonging to `slot`, sorted by name.
    #[must_use]
    pub fn slot_files(&self, slot: u64) -> Vec<PathBuf> {
        let prefix = format!("{slot}{SLOT_SEPARATOR}");
        let mut files: Vec<PathBuf> = self
            .visible_files()
            .into_iter()
            .filter(|(name, _, _)| name.starts_with(&prefix))
            .map(|(_, path, _)| path)
            .collect();
        files.sort();
        files
    }

    /// Path of the persistent file, if it exists.
    #[must_use]
    pub fn persistent_file(&self) -> Option<PathBuf> {
        let path = self.save_dir.join(PERSISTENT_FILE);
        path.is_file().then_some(path)
    }

    /// Build the local manifest for this save directory.
    ///
    /// Never fails: unreadable files are logged and left out, and a missing
    /// or empty directory yields an empty manifest.
    #[must_use]
    pub fn build_local_manifest(&self) -> Manifest {
        let mut candidates = Vec::new();

        if let Some(persistent) = self.persistent_file() {
            candidates.push(persistent);
        }

        if let Some(slot) = self.most_recent_slot() {
            debug!(slot, "Most recent save slot");
            candidates.extend(self.slot_files(slot));
        }

        let mut manifest = Manifest::new();
        for path in candidates {
            match self.file_record(&path) {
                Ok(record) => {
                    manifest.insert(record);
                }
                Err(e) => warn!(file = %path.display(), error = %e, "Skipping unreadable file"),
            }
        }

        debug!(files = manifest.len(), dir = %self.save_dir.display(), "Built local manifest");
        manifest
    }

    /// Read a tracked file's full contents.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the name is unsafe or the read fails.
    pub fn read_file(&self, filename: &str) -> Result<Vec<u8>> {
        let path = self.full_path(filename)?;
        fs::read(&path)
            .map_err(|e| Error::Storage(format!("Failed to read file {}: {e}", path.display())))
    }

    /// Write downloaded content for `filename`, backing up any existing copy.
    ///
    /// When `modified_at` is given the file's mtime is set to it, so the next
    /// comparison against the same remote record is a no-op. Failing to set
    /// the mtime is logged, not returned.
    ///
    /// # Errors
    ///
    /// Returns `Error::Storage` if the name is unsafe or the write fails.
    pub fn write_file(
        &self,
        filename: &str,
        content: &[u8],
        modified_at: Option<f64>,
    ) -> Result<Option<PathBuf>> {
        let path = self.full_path(filename)?;
        let backup = write_with_backup(&path, content, &self.backup_dir)?;

        if let Some(ts) = modified_at {
            if let Err(e) = crate::sync::file::set_modified(&path, ts) {
                warn!(file = %path.display(), error = %e, "Could not restore modification time");
            }
        }

        Ok(backup)
    }
}
