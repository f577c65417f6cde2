//! Persisted token session.
//!
//! The Cognito tokens survive between CLI invocations in `session.json`
//! under the cloudsave home. Writes go to a temp file with 0600
//! permissions and are renamed into place so a concurrent reader never
//! sees a half-written file.

use std::fs;
use std::io::Write;
#[cfg(unix)]
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Tokens with less than this many seconds left are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 300;

/// Tokens issued for one logged-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenSession {
    pub username: String,
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
    /// Unix seconds at which the access token expires
    pub expires_at: i64,
}

impl TokenSession {
    #[must_use]
    pub fn seconds_remaining(&self, now: i64) -> i64 {
        self.expires_at - now
    }

    /// Whether the access token is expired or about to be.
    #[must_use]
    pub fn needs_refresh(&self, now: i64) -> bool {
        self.seconds_remaining(now) < REFRESH_MARGIN_SECS
    }
}

/// Read the session file.
///
/// Returns `None` if the file is missing or unreadable; a corrupt file is
/// logged and ignored.
#[must_use]
pub fn read_session(path: &Path) -> Option<TokenSession> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
        Ok(session) => Some(session),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring corrupt session file");
            None
        }
    }
}

/// Write the session file atomically with owner-only permissions.
///
/// # Errors
///
/// Returns `Error::Storage` if the directory or file cannot be written.
pub fn write_session(path: &Path, session: &TokenSession) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .map_err(|e| Error::Storage(format!("Failed to create {}: {e}", dir.display())))?;
    }

    let json = serde_json::to_string_pretty(session)?;
    let mut temp_name = path.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = path.with_file_name(temp_name);

    let result = (|| -> std::io::Result<()> {
        {
            let mut opts = fs::OpenOptions::new();
            opts.write(true).create(true).truncate(true);
            #[cfg(unix)]
            opts.mode(0o600);
            let mut file = opts.open(&temp_path)?;
            file.write_all(json.as_bytes())?;
            file.flush()?;
        }
        fs::rename(&temp_path, path)?;
        Ok(())
    })();

    result.map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        Error::Storage(format!("Failed to write session {}: {e}", path.display()))
    })
}

/// Remove the session file. A missing file is not an error.
///
/// # Errors
///
/// Returns `Error::Storage` if the file exists and cannot be removed.
pub fn clear_session(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::Storage(format!("Failed to remove session {}: {e}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session(expires_at: i64) -> TokenSession {
        TokenSession {
            username: "player".into(),
            access_token: "access".into(),
            refresh_token: Some("refresh".into()),
            id_token: None,
            expires_at,
        }
    }

    #[test]
    fn test_write_read_clear() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("home").join("session.json");

        write_session(&path, &session(1000)).unwrap();
        assert_eq!(read_session(&path), Some(session(1000)));

        clear_session(&path).unwrap();
        assert!(read_session(&path).is_none());
        // Clearing twice is fine
        clear_session(&path).unwrap();
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        write_session(&path, &session(1000)).unwrap();

        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_corrupt_session_ignored() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("session.json");
        fs::write(&path, "{not json").unwrap();

        assert!(read_session(&path).is_none());
    }

    #[test]
    fn test_needs_refresh_margin() {
        let s = session(1000);
        assert!(!s.needs_refresh(1000 - REFRESH_MARGIN_SECS));
        assert!(s.needs_refresh(1000 - REFRESH_MARGIN_SECS + 1));
        assert!(s.needs_refresh(2000));
    }
}
