//! File fingerprinting for staleness detection

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use std::time::UNIX_EPOCH;
use tokio::fs;
use tracing::debug;

use quill_core::Result;

/// Staleness-detection triple for a single file.
///
/// `mtime` and `size` support the cheap fast-path comparison; `hash` is
/// the authoritative content identity (lowercase hex SHA-256 of the full
/// file bytes).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Modification time in epoch milliseconds
    pub mtime: i64,
    /// File size in bytes
    pub size: u64,
    /// Hex SHA-256 digest of the file content
    pub hash: String,
}

/// Compute the fingerprint of the file at `path`.
///
/// Returns `Ok(None)` when the path does not exist or is not a regular
/// file. Any other I/O error propagates: unlike cache reads, failing to
/// stat or read the file under analysis is not recoverable locally.
pub async fn fingerprint(path: &Path) -> Result<Option<Fingerprint>> {
    let meta = match fs::metadata(path).await {
        Ok(meta) => meta,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if !meta.is_file() {
        debug!("not a regular file, skipping fingerprint: {}", path.display());
        return Ok(None);
    }

    let bytes = match fs::read(path).await {
        Ok(bytes) => bytes,
        // Deleted between the stat and the read; same as never existing.
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    Ok(Some(Fingerprint {
        mtime: mtime_millis(&meta)?,
        size: meta.len(),
        hash: hex::encode(Sha256::digest(&bytes)),
    }))
}

// Failing to read the mtime is a primary-fingerprint I/O failure and
// propagates like any other; a file modified before the epoch is still
// representable, as negative millis.
fn mtime_millis(meta: &std::fs::Metadata) -> std::io::Result<i64> {
    let modified = meta.modified()?;
    Ok(match modified.duration_since(UNIX_EPOCH) {
        Ok(dur) => dur.as_millis() as i64,
        Err(e) => -(e.duration().as_millis() as i64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempdir().unwrap();
        let fp = fingerprint(&dir.path().join("nope.rs")).await.unwrap();
        assert!(fp.is_none());
    }

    #[tokio::test]
    async fn directory_is_none() {
        let dir = tempdir().unwrap();
        let fp = fingerprint(dir.path()).await.unwrap();
        assert!(fp.is_none());
    }

    #[tokio::test]
    async fn regular_file_gets_size_and_hash() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.txt");
        std::fs::write(&path, b"hello quill").unwrap();

        let fp = fingerprint(&path).await.unwrap().unwrap();
        assert_eq!(fp.size, 11);
        assert_eq!(fp.hash.len(), 64);
        assert!(fp.mtime > 0);
    }

    #[tokio::test]
    async fn identical_content_hashes_equal() {
        let dir = tempdir().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, b"same bytes").unwrap();
        std::fs::write(&b, b"same bytes").unwrap();

        let fa = fingerprint(&a).await.unwrap().unwrap();
        let fb = fingerprint(&b).await.unwrap().unwrap();
        assert_eq!(fa.hash, fb.hash);

        std::fs::write(&b, b"other bytes").unwrap();
        let fb2 = fingerprint(&b).await.unwrap().unwrap();
        assert_ne!(fa.hash, fb2.hash);
    }
}
