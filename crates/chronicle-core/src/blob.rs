//! Content-addressed blob store for code and config artifacts.
//!
//! Artifacts are stored on the filesystem under their SHA-256 digest, so
//! identical content is stored once and concurrent writers of the same
//! digest are safe. Stored files are made read-only after write.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::hash;

/// Errors from blob store operations.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum BlobError {
    /// The source was unreadable or the root was not writable.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Descriptor of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Algorithm-prefixed content address (`sha256:<hex>`).
    pub digest: String,
    /// Where the bytes live under the blob root.
    pub path: PathBuf,
    /// Content size in bytes.
    pub size: u64,
}

/// Stores a file's bytes under their content address.
///
/// Two calls with byte-identical input yield the same digest and path;
/// the second call skips the write. The stored file is made read-only.
///
/// # Errors
///
/// Returns [`BlobError::Io`] when the source is unreadable or the root is
/// not writable.
pub fn put(root: &Path, source_path: &Path) -> Result<StoredArtifact, BlobError> {
    let bytes = fs::read(source_path)?;
    let digest_hex = hash::content_digest(&bytes);
    let stored_path = root.join(&digest_hex);

    fs::create_dir_all(root)?;

    if !stored_path.exists() {
        fs::write(&stored_path, &bytes)?;
        let mut perms = fs::metadata(&stored_path)?.permissions();
        perms.set_readonly(true);
        fs::set_permissions(&stored_path, perms)?;
        debug!(digest = %digest_hex, size = bytes.len(), "stored artifact");
    }

    Ok(StoredArtifact {
        digest: format!("{}{digest_hex}", hash::DIGEST_PREFIX),
        path: stored_path,
        size: bytes.len() as u64,
    })
}

/// Checks whether a digest is present without reading its bytes.
///
/// Accepts both the `sha256:`-prefixed form and the raw hex file name.
#[must_use]
pub fn exists(root: &Path, digest: &str) -> bool {
    let hex = digest.strip_prefix(hash::DIGEST_PREFIX).unwrap_or(digest);
    root.join(hex).is_file()
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn fixture() -> (TempDir, PathBuf, PathBuf) {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("artifacts");
        let source = dir.path().join("input.bin");
        fs::write(&source, b"artifact bytes").unwrap();
        (dir, root, source)
    }

    #[test]
    fn put_stores_content_under_its_digest() {
        let (_dir, root, source) = fixture();

        let stored = put(&root, &source).unwrap();
        assert!(stored.digest.starts_with("sha256:"));
        assert_eq!(stored.size, 14);
        assert_eq!(fs::read(&stored.path).unwrap(), b"artifact bytes");

        let expected_name = stored.digest.strip_prefix("sha256:").unwrap();
        assert_eq!(stored.path.file_name().unwrap().to_str().unwrap(), expected_name);
    }

    #[test]
    fn put_deduplicates() {
        let (_dir, root, source) = fixture();

        let first = put(&root, &source).unwrap();
        let second = put(&root, &source).unwrap();

        assert_eq!(first, second);
        // Exactly one physical file.
        assert_eq!(fs::read_dir(&root).unwrap().count(), 1);
    }

    #[test]
    fn different_content_gets_different_digests() {
        let (dir, root, source) = fixture();
        let other = dir.path().join("other.bin");
        fs::write(&other, b"different bytes").unwrap();

        let a = put(&root, &source).unwrap();
        let b = put(&root, &other).unwrap();

        assert_ne!(a.digest, b.digest);
        assert_eq!(fs::read_dir(&root).unwrap().count(), 2);
    }

    #[test]
    fn stored_file_is_read_only() {
        let (_dir, root, source) = fixture();
        let stored = put(&root, &source).unwrap();
        assert!(fs::metadata(&stored.path).unwrap().permissions().readonly());
    }

    #[test]
    fn put_fails_on_unreadable_source() {
        let (dir, root, _source) = fixture();
        let missing = dir.path().join("missing.bin");
        assert!(matches!(put(&root, &missing), Err(BlobError::Io(_))));
    }

    #[test]
    fn exists_checks_without_reading() {
        let (_dir, root, source) = fixture();
        let stored = put(&root, &source).unwrap();

        assert!(exists(&root, &stored.digest));
        let raw = stored.digest.strip_prefix("sha256:").unwrap();
        assert!(exists(&root, raw));
        assert!(!exists(&root, "sha256:0000"));
    }
}
