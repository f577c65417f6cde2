//! Manifest model for cloudsave.
//!
//! A manifest maps file names to the metadata needed to decide which side of
//! a sync holds the newer copy. Two exist per sync unit: the *local* one,
//! rebuilt from disk on every run, and the *remote* one, stored per
//! (user, game) pair and fully replaced whenever a reconciliation plans uploads.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Sync-relevant metadata for one tracked file.
///
/// On the wire this is `{path, size, modifiedAt, checksum}`; the snake_case
/// `modified_timestamp` spelling is accepted on input as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    /// File name, unique within a manifest
    #[serde(rename = "path", alias = "name")]
    pub name: String,

    /// Size in bytes
    pub size: u64,

    /// Modification time (seconds since the Unix epoch)
    #[serde(alias = "modified_timestamp", default)]
    pub modified_at: f64,

    /// Hex SHA256 of the contents; empty means "not yet computed"
    #[serde(default)]
    pub checksum: String,
}

impl FileRecord {
    /// Create a record with a known checksum.
    pub fn new(name: impl Into<String>, size: u64, modified_at: f64, checksum: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            size,
            modified_at,
            checksum: checksum.into(),
        }
    }

    /// Whether the checksum has been computed.
    #[must_use]
    pub fn has_checksum(&self) -> bool {
        !self.checksum.is_empty()
    }
}

/// Mapping from file name to [`FileRecord`].
///
/// Backed by a `BTreeMap` so iteration (and therefore plan order) is
/// deterministic for a given set of names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    files: BTreeMap<String, FileRecord>,
}

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a record keyed by its own name, replacing any previous entry.
    pub fn insert(&mut self, record: FileRecord) -> Option<FileRecord> {
        self.files.insert(record.name.clone(), record)
    }

    /// Remove and return the record for `name`.
    pub fn remove(&mut self, name: &str) -> Option<FileRecord> {
        self.files.remove(name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&FileRecord> {
        self.files.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.files.contains_key(name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Iterate over records in name order.
    pub fn iter(&self) -> impl Iterator<Item = &FileRecord> {
        self.files.values()
    }

    /// File names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Total size of all tracked files in bytes.
    #[must_use]
    pub fn total_size(&self) -> u64 {
        self.files.values().map(|r| r.size).sum()
    }
}

impl FromIterator<FileRecord> for Manifest {
    fn from_iter<I: IntoIterator<Item = FileRecord>>(iter: I) -> Self {
        let mut manifest = Self::new();
        for record in iter {
            manifest.insert(record);
        }
        manifest
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a FileRecord;
    type IntoIter = std::collections::btree_map::Values<'a, String, FileRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.files.values()
    }
}

/// The durable remote manifest row for one (user, game) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteManifest {
    pub user_id: String,
    pub game_id: String,
    pub files: Manifest,
    /// Unix seconds of the last write
    pub last_updated: i64,
}
