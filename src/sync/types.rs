//! Result and state types for sync runs.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One file that could not be transferred.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferFailure {
    pub filename: String,
    pub error: String,
}

/// What a transfer pass did.
///
/// `uploaded` and `downloaded` include conflict resolutions in their
/// direction; `conflicts_resolved` lists the conflicts among them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TransferReport {
    pub uploaded: Vec<String>,
    pub downloaded: Vec<String>,
    pub conflicts_resolved: Vec<String>,
    pub failed: Vec<TransferFailure>,
}

impl TransferReport {
    /// Returns true if every attempted item succeeded.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }

    /// Number of files that actually moved.
    #[must_use]
    pub fn transferred(&self) -> usize {
        self.uploaded.len() + self.downloaded.len()
    }

    /// Failure messages joined into one line, if any.
    #[must_use]
    pub fn error_summary(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        Some(
            self.failed
                .iter()
                .map(|f| format!("{}: {}", f.filename, f.error))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    pub(crate) fn fail(&mut self, filename: &str, error: impl std::fmt::Display) {
        self.failed.push(TransferFailure {
            filename: filename.to_string(),
            error: error.to_string(),
        });
    }
}

/// Why a sync call did nothing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason", content = "error")]
pub enum SkipReason {
    NotAuthenticated,
    /// Interval since the last sync has not elapsed.
    Throttled,
    /// Another sync on this manager is in flight.
    AlreadyRunning,
    /// The attempt started and failed; carries the error message.
    Failed(String),
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAuthenticated => write!(f, "not authenticated"),
            Self::Throttled => write!(f, "sync interval has not elapsed"),
            Self::AlreadyRunning => write!(f, "a sync is already running"),
            Self::Failed(e) => write!(f, "sync failed: {e}"),
        }
    }
}

/// Outcome of one orchestrated sync call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum SyncOutcome {
    Performed { report: TransferReport },
    NotPerformed { reason: SkipReason },
}

impl SyncOutcome {
    #[must_use]
    pub const fn performed(&self) -> bool {
        matches!(self, Self::Performed { .. })
    }
}

/// Orchestrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Running,
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Snapshot of an orchestrator for status output.
#[derive(Debug, Clone, Serialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub last_sync_time: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_summary_joins_failures() {
        let mut report = TransferReport::default();
        assert_eq!(report.error_summary(), None);

        report.fail("a.save", "Upload failed (403)");
        report.fail("persistent", "disk full");

        assert!(!report.is_success());
        assert_eq!(
            report.error_summary().unwrap(),
            "a.save: Upload failed (403); persistent: disk full"
        );
    }

    #[test]
    fn test_outcome_serialization() {
        let skipped = SyncOutcome::NotPerformed { reason: SkipReason::Throttled };
        let value = serde_json::to_value(&skipped).unwrap();
        assert_eq!(value["outcome"], "not_performed");
        assert_eq!(value["reason"]["reason"], "throttled");
        assert!(!skipped.performed());

        let done = SyncOutcome::Performed { report: TransferReport::default() };
        assert_eq!(serde_json::to_value(&done).unwrap()["outcome"], "performed");
    }
}
