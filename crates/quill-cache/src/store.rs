//! On-disk cache storage
//!
//! Maps `(scope, info type, relative path)` triples to flat cache files
//! under the repository's cache root and handles JSON encoding of
//! entries. Reads are tolerant: anything unreadable is a cold cache.
//! Writes fail open: a failed write never fails the caller's lookup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, warn};

use quill_core::config::CacheConfig;
use quill_core::fail_open::fail_open;

use crate::fingerprint::Fingerprint;

/// Which cache subtree a context's entries live in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheScope {
    /// The canonical repository checkout
    Repository,
    /// One isolated worktree, keyed by the basename of its root
    Worktree { name: String },
}

/// Metadata persisted alongside each cached value.
///
/// Serialized in camelCase to match the on-disk cache file format.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
    /// Absolute path of the file the data was derived from
    pub source_file_path: String,
    pub mtime: i64,
    pub size: u64,
    pub hash: String,
}

impl CacheMetadata {
    /// Whether the stored stat metadata (mtime and size) still matches
    /// the file, without comparing content hashes.
    pub fn stat_matches(&self, current: &Fingerprint) -> bool {
        self.mtime == current.mtime && self.size == current.size
    }
}

/// One cached analysis result for one `(scope, info type, path)` key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    pub metadata: CacheMetadata,
    /// Whatever the provider returned; the cache never inspects its shape
    pub data: serde_json::Value,
}

impl CacheEntry {
    pub fn new(source_file: &Path, fingerprint: Fingerprint, data: serde_json::Value) -> Self {
        Self {
            metadata: CacheMetadata {
                source_file_path: source_file.to_string_lossy().into_owned(),
                mtime: fingerprint.mtime,
                size: fingerprint.size,
                hash: fingerprint.hash,
            },
            data,
        }
    }
}

/// Disk-backed store for cache entries, rooted under one repository.
pub struct CacheStore {
    /// `<repoRoot>/.quill/cache` by default
    cache_root: PathBuf,
}

impl CacheStore {
    pub fn new(repo_root: &Path, config: &CacheConfig) -> Self {
        Self {
            cache_root: repo_root.join(&config.dir),
        }
    }

    /// Map a cache key to its file path. Pure: no I/O.
    ///
    /// The relative path is flattened by replacing separators with `__`,
    /// then suffixed with `_<infoType>_.info`.
    pub fn path_for(&self, scope: &CacheScope, info_type: &str, relative_path: &str) -> PathBuf {
        let encoded = relative_path.replace(['/', '\\'], "__");
        let file_name = format!("{}_{}_.info", encoded, info_type);
        match scope {
            CacheScope::Repository => self.cache_root.join("repository").join(file_name),
            CacheScope::Worktree { name } => {
                self.cache_root.join("worktrees").join(name).join(file_name)
            }
        }
    }

    /// Read an entry, treating every failure mode as a cold cache.
    ///
    /// Missing file, unreadable file, malformed JSON, and entries whose
    /// metadata lacks a content hash all come back as `None`. A missing
    /// hash surfaces as a deserialization failure since the field is
    /// mandatory on [`CacheMetadata`].
    pub async fn read(&self, cache_path: &Path) -> Option<CacheEntry> {
        let bytes = match fs::read(cache_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!("failed to read cache file {}: {}", cache_path.display(), e);
                return None;
            }
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.metadata.hash.is_empty() => {
                warn!(
                    "cache file {} has an empty content hash, ignoring",
                    cache_path.display()
                );
                None
            }
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(
                    "malformed cache file {}, ignoring: {}",
                    cache_path.display(),
                    e
                );
                None
            }
        }
    }

    /// Persist an entry, creating parent directories as needed.
    ///
    /// Failures are logged and swallowed: the computed data has already
    /// been handed to the caller and a lost cache write only costs a
    /// recompute later.
    pub async fn write(&self, cache_path: &Path, entry: &CacheEntry) {
        fail_open("cache write", || async {
            if let Some(parent) = cache_path.parent() {
                fs::create_dir_all(parent).await?;
            }
            let bytes = serde_json::to_vec(entry)?;
            fs::write(cache_path, bytes).await?;
            Ok(())
        })
        .await;
    }

    /// Remove the entire cache subtree for one worktree.
    ///
    /// The repository subtree has no teardown hook; asking to delete it
    /// is refused with a warning.
    pub async fn delete_context_tree(&self, scope: &CacheScope) {
        let name = match scope {
            CacheScope::Repository => {
                warn!("refusing to delete the repository cache tree");
                return;
            }
            CacheScope::Worktree { name } => name,
        };

        let tree = self.cache_root.join("worktrees").join(name);
        debug!("deleting worktree cache tree {}", tree.display());
        fail_open("cache tree delete", || async {
            match fs::remove_dir_all(&tree).await {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e.into()),
            }
        })
        .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn store(root: &Path) -> CacheStore {
        CacheStore::new(root, &CacheConfig::default())
    }

    fn entry(data: serde_json::Value) -> CacheEntry {
        CacheEntry::new(
            Path::new("/repo/src/index.ts"),
            Fingerprint {
                mtime: 1_700_000_000_000,
                size: 42,
                hash: "abc123".into(),
            },
            data,
        )
    }

    #[test]
    fn path_encoding_flattens_separators() {
        let store = store(Path::new("/repo"));
        let path = store.path_for(&CacheScope::Repository, "ast", "src/index.ts");
        assert_eq!(
            path,
            Path::new("/repo/.quill/cache/repository/src__index.ts_ast_.info")
        );

        let wt = CacheScope::Worktree {
            name: "feature-x".into(),
        };
        let path = store.path_for(&wt, "exports", "lib/util/mod.rs");
        assert_eq!(
            path,
            Path::new("/repo/.quill/cache/worktrees/feature-x/lib__util__mod.rs_exports_.info")
        );
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let path = store.path_for(&CacheScope::Repository, "ast", "src/a.rs");

        store.write(&path, &entry(serde_json::json!({"k": 1}))).await;

        let read = store.read(&path).await.unwrap();
        assert_eq!(read.data, serde_json::json!({"k": 1}));
        assert_eq!(read.metadata.size, 42);
    }

    #[tokio::test]
    async fn on_disk_format_is_camel_case() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let path = store.path_for(&CacheScope::Repository, "ast", "a.rs");

        store.write(&path, &entry(serde_json::json!(null))).await;

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"sourceFilePath\""));
        assert!(raw.contains("\"mtime\""));
    }

    #[tokio::test]
    async fn missing_and_malformed_files_read_as_cold() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let path = store.path_for(&CacheScope::Repository, "ast", "a.rs");

        assert!(store.read(&path).await.is_none());

        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, b"{ not json").unwrap();
        assert!(store.read(&path).await.is_none());

        // Valid JSON but no metadata.hash
        std::fs::write(&path, br#"{"metadata": {"sourceFilePath": "x", "mtime": 1, "size": 2}, "data": 3}"#)
            .unwrap();
        assert!(store.read(&path).await.is_none());
    }

    #[tokio::test]
    async fn repository_tree_deletion_is_refused() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let path = store.path_for(&CacheScope::Repository, "ast", "a.rs");
        store.write(&path, &entry(serde_json::json!(1))).await;

        store.delete_context_tree(&CacheScope::Repository).await;
        assert!(path.exists());
    }

    #[tokio::test]
    async fn worktree_tree_deletion_is_scoped() {
        let dir = tempdir().unwrap();
        let store = store(dir.path());
        let a = CacheScope::Worktree { name: "a".into() };
        let b = CacheScope::Worktree { name: "b".into() };

        let path_a = store.path_for(&a, "ast", "x.rs");
        let path_b = store.path_for(&b, "ast", "x.rs");
        store.write(&path_a, &entry(serde_json::json!(1))).await;
        store.write(&path_b, &entry(serde_json::json!(2))).await;

        store.delete_context_tree(&a).await;
        assert!(!path_a.exists());
        assert!(path_b.exists());

        // Deleting an already-missing tree is not an error
        store.delete_context_tree(&a).await;
    }
}
