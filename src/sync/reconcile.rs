//! Reconciliation engine.
//!
//! Pure functions mapping a local and a remote manifest to the transfers
//! needed to bring both sides level. No I/O happens here.
//!
//! # Comparison rules
//!
//! Applied in order for a file present locally:
//! 1. No remote record → upload
//! 2. Local newer → upload
//! 3. Remote newer → download
//! 4. Same time, same checksum → nothing to do
//! 5. Same time, different checksum → conflict, resolved by comparing the
//!    checksum strings: the greater string wins the whole file
//!
//! Files present only remotely are always downloaded. Nothing is ever
//! deleted: local absence is not evidence of deletion.

use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{ActionPlan, Direction, FileRecord, Manifest};

/// Outcome of comparing one local record with its remote counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "resolution")]
pub enum Comparison {
    Upload,
    Download,
    Noop,
    /// Same timestamp, different content; carries the tie-break winner.
    Conflict(Direction),
}

impl Comparison {
    /// The transfer this comparison calls for, if any.
    #[must_use]
    pub const fn direction(self) -> Option<Direction> {
        match self {
            Self::Upload => Some(Direction::Upload),
            Self::Download => Some(Direction::Download),
            Self::Conflict(d) => Some(d),
            Self::Noop => None,
        }
    }
}

/// Compare a local record against the remote one (or its absence).
#[must_use]
pub fn compare(local: &FileRecord, remote: Option<&FileRecord>) -> Comparison {
    let Some(remote) = remote else {
        return Comparison::Upload;
    };

    match local.modified_at.total_cmp(&remote.modified_at) {
        Ordering::Greater => Comparison::Upload,
        Ordering::Less => Comparison::Download,
        Ordering::Equal => match local.checksum.cmp(&remote.checksum) {
            Ordering::Equal => Comparison::Noop,
            Ordering::Greater => Comparison::Conflict(Direction::Upload),
            Ordering::Less => Comparison::Conflict(Direction::Download),
        },
    }
}

/// A plan plus the remote manifest that reflects it.
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciliation {
    pub plan: ActionPlan,
    /// Prior remote manifest with every planned upload's local record laid over it
    pub next_remote: Manifest,
}

impl Reconciliation {
    /// Whether persisting `next_remote` would change anything.
    #[must_use]
    pub fn has_uploads(&self) -> bool {
        self.plan.upload_names().next().is_some()
    }
}

/// Reconcile a local manifest against the remote one.
///
/// An empty local manifest is not special: every remote file is downloaded.
#[must_use]
pub fn reconcile(local: &Manifest, remote: &Manifest) -> Reconciliation {
    let mut plan = ActionPlan::default();
    let mut next_remote = remote.clone();

    for record in local {
        match compare(record, remote.get(&record.name)) {
            Comparison::Upload => {
                plan.uploads.insert(record.name.clone());
                next_remote.insert(record.clone());
            }
            Comparison::Download => {
                plan.downloads.insert(record.name.clone());
            }
            Comparison::Conflict(direction) => {
                plan.conflicts.insert(record.name.clone(), direction);
                if direction == Direction::Upload {
                    next_remote.insert(record.clone());
                }
            }
            Comparison::Noop => {}
        }
    }

    for name in remote.names() {
        if !local.contains(name) {
            plan.downloads.insert(name.to_string());
        }
    }

    Reconciliation { plan, next_remote }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(name: &str, ts: f64, checksum: &str) -> FileRecord {
        FileRecord::new(name, 1, ts, checksum)
    }

    fn manifest(records: &[FileRecord]) -> Manifest {
        records.iter().cloned().collect()
    }

    fn names(set: &std::collections::BTreeSet<String>) -> Vec<&str> {
        set.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_compare_absent_remote_uploads() {
        assert_eq!(compare(&rec("a", 0.0, ""), None), Comparison::Upload);
        assert_eq!(compare(&rec("a", 5.0, "x"), None), Comparison::Upload);
    }

    #[test]
    fn test_compare_by_timestamp() {
        let older = rec("a", 100.0, "zzz");
        let newer = rec("a", 200.0, "aaa");

        assert_eq!(compare(&newer, Some(&older)), Comparison::Upload);
        assert_eq!(compare(&older, Some(&newer)), Comparison::Download);
    }

    #[test]
    fn test_compare_equal_is_noop() {
        let a = rec("a", 100.0, "abc");
        assert_eq!(compare(&a, Some(&a.clone())), Comparison::Noop);
    }

    #[test]
    fn test_conflict_tie_break_is_antisymmetric() {
        let pairs = [("zzz", "aaa"), ("b", "ab"), ("0f", "f0"), ("abc", "abcd")];

        for (x, y) in pairs {
            let left = rec("f", 7.0, x);
            let right = rec("f", 7.0, y);
            let forward = compare(&left, Some(&right));
            let backward = compare(&right, Some(&left));

            let expected = if x > y { Direction::Upload } else { Direction::Download };
            assert_eq!(forward, Comparison::Conflict(expected), "{x} vs {y}");
            assert_ne!(forward.direction(), backward.direction(), "{x} vs {y}");
            assert!(matches!(backward, Comparison::Conflict(_)));
        }
    }

    #[test]
    fn test_tie_break_is_string_order_not_length() {
        // The longer checksum loses when it sorts first
        let local = rec("f", 1.0, "aaaa");
        let remote = rec("f", 1.0, "b");
        assert_eq!(compare(&local, Some(&remote)), Comparison::Conflict(Direction::Download));
    }

    #[test]
    fn test_compare_is_deterministic() {
        let local = rec("f", 1.0, "abc");
        let remote = rec("f", 1.0, "abd");
        assert_eq!(compare(&local, Some(&remote)), compare(&local, Some(&remote)));
    }

    #[test]
    fn test_reconcile_empty_manifests() {
        let result = reconcile(&Manifest::new(), &Manifest::new());
        assert!(result.plan.is_empty());
        assert!(result.next_remote.is_empty());
        assert!(!result.has_uploads());
    }

    #[test]
    fn test_scenario_upload_new_file() {
        let local = manifest(&[rec("save.dat", 200.0, "aaa")]);
        let result = reconcile(&local, &Manifest::new());

        assert_eq!(names(&result.plan.uploads), vec!["save.dat"]);
        assert!(result.plan.downloads.is_empty());
        assert!(result.plan.conflicts.is_empty());
        assert!(result.plan.deletes.is_empty());
        assert_eq!(result.next_remote, local);
    }

    #[test]
    fn test_scenario_download_newer_remote() {
        let local = manifest(&[rec("save.dat", 100.0, "aaa")]);
        let remote = manifest(&[rec("save.dat", 200.0, "bbb")]);
        let result = reconcile(&local, &remote);

        assert_eq!(names(&result.plan.downloads), vec!["save.dat"]);
        assert!(result.plan.uploads.is_empty());
        assert_eq!(result.next_remote, remote);
    }

    #[test]
    fn test_scenario_conflict_resolves_to_upload() {
        let local = manifest(&[rec("save.dat", 100.0, "zzz")]);
        let remote = manifest(&[rec("save.dat", 100.0, "aaa")]);
        let result = reconcile(&local, &remote);

        assert_eq!(result.plan.conflicts.get("save.dat"), Some(&Direction::Upload));
        assert!(result.plan.uploads.is_empty());
        assert!(result.plan.downloads.is_empty());
        // The winning local record replaces the remote one
        assert_eq!(result.next_remote.get("save.dat").unwrap().checksum, "zzz");
        assert!(result.has_uploads());
    }

    #[test]
    fn test_conflict_download_leaves_remote_manifest() {
        let local = manifest(&[rec("save.dat", 100.0, "aaa")]);
        let remote = manifest(&[rec("save.dat", 100.0, "zzz")]);
        let result = reconcile(&local, &remote);

        assert_eq!(result.plan.conflicts.get("save.dat"), Some(&Direction::Download));
        assert_eq!(result.next_remote, remote);
        assert!(!result.has_uploads());
    }

    #[test]
    fn test_remote_only_files_download_even_with_empty_local() {
        let remote = manifest(&[rec("persistent", 5.0, "p"), rec("1-1-LT1.save", 6.0, "s")]);
        let result = reconcile(&Manifest::new(), &remote);

        assert_eq!(names(&result.plan.downloads), vec!["1-1-LT1.save", "persistent"]);
        assert!(result.plan.uploads.is_empty());
        assert!(result.plan.deletes.is_empty());
    }

    #[test]
    fn test_mixed_plan_and_overlay() {
        let local = manifest(&[
            rec("persistent", 300.0, "p2"),  // newer → upload
            rec("2-1-LT1.save", 100.0, "s"), // equal → noop
            rec("2-2-LT1.save", 50.0, "x"),  // older → download
        ]);
        let remote = manifest(&[
            rec("persistent", 200.0, "p1"),
            rec("2-1-LT1.save", 100.0, "s"),
            rec("2-2-LT1.save", 60.0, "y"),
            rec("1-1-LT1.save", 10.0, "old"), // remote only → download
        ]);

        let result = reconcile(&local, &remote);

        assert_eq!(names(&result.plan.uploads), vec!["persistent"]);
        assert_eq!(names(&result.plan.downloads), vec!["1-1-LT1.save", "2-2-LT1.save"]);
        assert!(result.plan.conflicts.is_empty());
        assert_eq!(result.next_remote.len(), 4);
        assert_eq!(result.next_remote.get("persistent").unwrap().checksum, "p2");
        assert_eq!(result.next_remote.get("2-2-LT1.save").unwrap().checksum, "y");
    }
}
