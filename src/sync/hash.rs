//! Content fingerprints for sync operations.
//!
//! Files are fingerprinted with SHA256 over their full contents, read in
//! fixed-size chunks so large saves never need to fit in memory. The digest
//! is rendered as 64 lowercase hex characters.

use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Chunk size used when streaming file contents into the hasher.
pub const HASH_CHUNK_SIZE: usize = 8192;

/// Compute the SHA256 hex digest of a file's contents.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn file_checksum(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; HASH_CHUNK_SIZE];

    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

/// Compute the SHA256 hex digest of an in-memory buffer.
#[must_use]
pub fn bytes_checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_checksum_matches_bytes_checksum() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("1-1-LT1.save");
        // Spans several chunks with a partial tail
        let content: Vec<u8> = (0..(HASH_CHUNK_SIZE * 3 + 17)).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        let from_file = file_checksum(&path).unwrap();
        assert_eq!(from_file, bytes_checksum(&content));
        assert_eq!(from_file.len(), 64); // SHA256 produces 64 hex chars
    }

    #[test]
    fn test_known_digest() {
        assert_eq!(
            bytes_checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_checksum_changes_with_content() {
        assert_ne!(bytes_checksum(b"save one"), bytes_checksum(b"save two"));
    }

    #[test]
    fn test_missing_file_is_error() {
        assert!(file_checksum(Path::new("/nonexistent/persistent")).is_err());
    }
}
