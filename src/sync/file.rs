//! Safe file operations for sync.
//!
//! This module provides the local write path used by downloads:
//! - Atomic writes: write to temp file, sync to disk, then rename
//! - Timestamped backups of a file before it is overwritten
//! - Filename validation for names that arrive from the remote side

use std::fs::{self, File, FileTimes};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Directory (inside the save directory) that receives pre-overwrite backups.
pub const BACKUP_DIR_NAME: &str = ".cloudsave_backups";

/// Reject names that could escape the directory they are joined onto.
///
/// Remote plans name files by bare filename; anything with a path separator,
/// a parent reference, or a NUL is refused.
///
/// # Errors
///
/// Returns `Error::Storage` for an unsafe or empty name.
pub fn validate_filename(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name == "."
        || name == ".."
        || name.contains('/')
        || name.contains('\\')
        || name.contains('\0');
    if bad {
        return Err(Error::Storage(format!("Refusing unsafe file name: {name:?}")));
    }
    Ok(())
}

/// Write bytes to a file atomically.
///
/// This function:
/// 1. Writes content to a temporary sibling (`<name>.cloudsave.tmp`)
/// 2. Calls `fsync` to ensure data is on disk
/// 3. Atomically renames the temp file to the target path
///
/// If any step fails, the original file (if any) remains untouched.
///
/// # Errors
///
/// Returns an error if any file operation fails.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    let file_name = path
        .file_name()
        .ok_or_else(|| Error::Storage(format!("Not a file path: {}", path.display())))?;
    let mut temp_name = file_name.to_os_string();
    temp_name.push(".cloudsave.tmp");
    let temp_path = path.with_file_name(temp_name);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| {
            Error::Storage(format!("Failed to create directory {}: {e}", parent.display()))
        })?;
    }

    let written = (|| -> std::io::Result<()> {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        writer.write_all(content)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    })();

    if let Err(e) = written {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::Storage(format!("Failed to write file {}: {e}", path.display())));
    }

    fs::rename(&temp_path, path)
        .map_err(|e| Error::Storage(format!("Failed to write file {}: {e}", path.display())))
}

/// Copy a file verbatim into `backup_dir` under a timestamped name.
///
/// The backup is named `<file>.<YYYYmmdd_HHMMSS>.backup`; a second backup of
/// the same file within one second gets a `_<n>` counter after the stamp.
///
/// # Errors
///
/// Returns `Error::Storage` if the directory cannot be created or the copy fails.
pub fn backup_file(path: &Path, backup_dir: &Path) -> Result<PathBuf> {
    fs::create_dir_all(backup_dir)
        .map_err(|e| Error::Storage(format!("Failed to create backup directory: {e}")))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    let stamp = chrono::Local::now().format("%Y%m%d_%H%M%S").to_string();
    let backup_path = unused_backup_path(backup_dir, &file_name, &stamp);

    fs::copy(path, &backup_path)
        .map_err(|e| Error::Storage(format!("Failed to backup file {}: {e}", path.display())))?;

    Ok(backup_path)
}

fn unused_backup_path(backup_dir: &Path, file_name: &str, stamp: &str) -> PathBuf {
    let first = backup_dir.join(format!("{file_name}.{stamp}.backup"));
    if !first.exists() {
        return first;
    }

    (1u32..)
        .map(|n| backup_dir.join(format!("{file_name}.{stamp}_{n}.backup")))
        .find(|candidate| !candidate.exists())
        .unwrap_or(first)
}

/// Write downloaded content over `path`, backing up any existing file first.
///
/// No backup is made when the existing file already holds `content`. A
/// failed backup is logged and the write proceeds anyway.
///
/// Returns the backup path if one was made.
///
/// # Errors
///
/// Returns an error only if the new content cannot be written.
pub fn write_with_backup(path: &Path, content: &[u8], backup_dir: &Path) -> Result<Option<PathBuf>> {
    let mut backup = None;

    if path.exists() {
        if fs::read(path).is_ok_and(|existing| existing == content) {
            debug!(file = %path.display(), "Content unchanged; no backup needed");
        } else {
            match backup_file(path, backup_dir) {
                Ok(p) => {
                    debug!(file = %path.display(), backup = %p.display(), "Backed up before overwrite");
                    backup = Some(p);
                }
                Err(e) => warn!(file = %path.display(), error = %e, "Backup failed; overwriting anyway"),
            }
        }
    }

    atomic_write(path, content)?;
    Ok(backup)
}

/// Set a file's modification time from Unix seconds.
///
/// # Errors
///
/// Returns `Error::Storage` if the timestamp is not representable or the
/// file cannot be updated.
pub fn set_modified(path: &Path, unix_seconds: f64) -> Result<()> {
    let since_epoch = Duration::try_from_secs_f64(unix_seconds)
        .map_err(|_| Error::Storage(format!("Invalid modification time: {unix_seconds}")))?;
    let mtime = UNIX_EPOCH + since_epoch;

    let file = fs::OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| Error::Storage(format!("Failed to open {}: {e}", path.display())))?;
    file.set_times(FileTimes::new().set_modified(mtime))
        .map_err(|e| Error::Storage(format!("Failed to set mtime on {}: {e}", path.display())))
}

/// Convert a filesystem timestamp to Unix seconds.
#[must_use]
pub fn modified_seconds(modified: SystemTime) -> f64 {
    match modified.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs_f64(),
        Err(e) => -e.duration().as_secs_f64(),
    }
}
