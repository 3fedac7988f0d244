//! Derived-info orchestration across repository and worktree contexts
//!
//! A [`FileInfoCache`] owns the cache store and provider registry for one
//! repository root. Contexts created from it answer `get_info` lookups:
//! fingerprint the file, try the cache, try promoting the repository's
//! value into a worktree when content is byte-identical, and only then
//! fall back to the provider. Soft failures (unregistered info type,
//! absent file, provider or cache I/O trouble) degrade to `None`; cycles
//! and context misuse propagate as errors.

use futures::future::BoxFuture;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

use quill_core::{QuillError, Result};

use crate::fingerprint::{fingerprint, Fingerprint};
use crate::registry::ProviderRegistry;
use crate::store::{CacheEntry, CacheScope, CacheStore};

/// Shared cache state for one repository root: the on-disk store and the
/// provider registry, injected into every context created from it.
pub struct FileInfoCache {
    repo_root: PathBuf,
    store: CacheStore,
    registry: ProviderRegistry,
}

impl FileInfoCache {
    /// Build the cache for a repository root with default cache layout.
    pub fn new(repo_root: impl Into<PathBuf>, registry: ProviderRegistry) -> Arc<Self> {
        Self::with_config(
            repo_root,
            registry,
            &quill_core::config::CacheConfig::default(),
        )
    }

    /// Build the cache with an explicit cache layout from config.
    pub fn with_config(
        repo_root: impl Into<PathBuf>,
        registry: ProviderRegistry,
        config: &quill_core::config::CacheConfig,
    ) -> Arc<Self> {
        let repo_root = repo_root.into();
        let store = CacheStore::new(&repo_root, config);
        Arc::new(Self {
            repo_root,
            store,
            registry,
        })
    }

    /// The canonical context rooted at the repository itself.
    pub fn repository_context(self: &Arc<Self>) -> Arc<FileInfoContext> {
        Arc::new(FileInfoContext {
            root: self.repo_root.clone(),
            repository: None,
            cache: Arc::clone(self),
        })
    }

    /// The provider table this cache was built with.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }
}

/// One resolution root for relative paths and cached derived info.
///
/// Either the repository itself (no parent) or a worktree referencing
/// exactly one repository context. The constructors make the remaining
/// illegal shapes unbuildable; a worktree chained onto another worktree
/// is rejected at construction.
pub struct FileInfoContext {
    root: PathBuf,
    /// `Some` exactly when this context is a worktree
    repository: Option<Arc<FileInfoContext>>,
    cache: Arc<FileInfoCache>,
}

impl FileInfoContext {
    /// Build a worktree context on top of a repository context.
    pub fn worktree(
        root: impl Into<PathBuf>,
        repository: Arc<FileInfoContext>,
    ) -> Result<Arc<Self>> {
        if repository.is_worktree() {
            return Err(QuillError::InvalidContext(
                "a worktree context must reference a repository context, not another worktree"
                    .into(),
            ));
        }

        let root = root.into();
        if root.file_name().is_none() {
            return Err(QuillError::InvalidContext(format!(
                "worktree root has no basename: {}",
                root.display()
            )));
        }

        Ok(Arc::new(Self {
            root,
            cache: Arc::clone(&repository.cache),
            repository: Some(repository),
        }))
    }

    pub fn is_worktree(&self) -> bool {
        self.repository.is_some()
    }

    /// Root directory relative paths resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scope(&self) -> CacheScope {
        if self.is_worktree() {
            // Construction guaranteed a basename exists.
            let name = self
                .root
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            CacheScope::Worktree { name }
        } else {
            CacheScope::Repository
        }
    }

    /// Return up-to-date derived info of `info_type` for `relative_path`.
    ///
    /// `Ok(None)` covers every soft outcome: file absent, no provider
    /// registered, provider found nothing, provider or cache I/O failed.
    /// Cycles, context misuse, and I/O errors fingerprinting the file
    /// itself surface as `Err`.
    ///
    /// Concurrent calls for the same key are not deduplicated: both
    /// callers may invoke the provider and both write an entry, with
    /// the second write winning. Cycle detection only trips on genuine
    /// re-entry within one call chain, never on concurrent siblings.
    pub async fn get_info(
        &self,
        info_type: &str,
        relative_path: &str,
    ) -> Result<Option<serde_json::Value>> {
        self.get_info_chained(info_type, relative_path, &[]).await
    }

    // Boxed so the future type stays finite: `get_info` recurses through
    // providers and through the worktree -> repository promotion path.
    //
    // `chain` is the stack of signatures already being computed on this
    // logical call chain. It is threaded through nested provider calls
    // via [`ProviderContext`]; crossing into the repository context
    // during promotion starts a fresh chain there.
    fn get_info_chained<'a>(
        &'a self,
        info_type: &'a str,
        relative_path: &'a str,
        chain: &'a [String],
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>>> {
        Box::pin(async move {
            let signature = format!("{}:{}", info_type, relative_path);
            if chain.contains(&signature) {
                let mut full = chain.to_vec();
                full.push(signature);
                return Err(QuillError::CircularDependency { chain: full });
            }

            let mut extended = Vec::with_capacity(chain.len() + 1);
            extended.extend_from_slice(chain);
            extended.push(signature);
            self.get_info_inner(info_type, relative_path, &extended).await
        })
    }

    async fn get_info_inner(
        &self,
        info_type: &str,
        relative_path: &str,
        chain: &[String],
    ) -> Result<Option<serde_json::Value>> {
        let Some(provider) = self.cache.registry.lookup(info_type) else {
            warn!("no provider registered for info type '{}'", info_type);
            return Ok(None);
        };

        let absolute = self.root.join(relative_path);
        let Some(current) = fingerprint(&absolute).await? else {
            debug!("no file to analyze at {}", absolute.display());
            return Ok(None);
        };

        let cache_path = self
            .cache
            .store
            .path_for(&self.scope(), info_type, relative_path);
        if let Some(entry) = self.cache.store.read(&cache_path).await {
            if entry.metadata.stat_matches(&current) {
                debug!("cache hit (stat) for {}:{}", info_type, relative_path);
                return Ok(Some(entry.data));
            }
            if entry.metadata.hash == current.hash {
                debug!(
                    "cache hit (content) for {}:{} despite touched metadata",
                    info_type, relative_path
                );
                return Ok(Some(entry.data));
            }
        }

        if let Some(data) = self
            .try_promote(info_type, relative_path, &absolute, &current, &cache_path)
            .await?
        {
            return Ok(Some(data));
        }

        let scope = ProviderContext {
            context: self,
            chain,
        };
        match provider.extract_info(relative_path, &scope).await {
            Ok(Some(data)) => {
                let entry = CacheEntry::new(&absolute, current, data.clone());
                self.cache.store.write(&cache_path, &entry).await;
                debug!("computed {}:{}", info_type, relative_path);
                Ok(Some(data))
            }
            Ok(None) => {
                // Negative results are never cached; the next call tries
                // the provider again.
                debug!("provider returned no data for {}:{}", info_type, relative_path);
                Ok(None)
            }
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    "provider '{}' failed for {}: {}",
                    info_type, relative_path, e
                );
                Ok(None)
            }
        }
    }

    /// Worktree-only: reuse the repository's value when this worktree's
    /// copy of the file is byte-identical to the repository's copy.
    ///
    /// The promoted value is persisted under *this* context's own
    /// fingerprint metadata. Failures on the repository side are soft;
    /// the caller falls through to local computation.
    async fn try_promote(
        &self,
        info_type: &str,
        relative_path: &str,
        absolute: &Path,
        current: &Fingerprint,
        cache_path: &Path,
    ) -> Result<Option<serde_json::Value>> {
        let Some(repository) = &self.repository else {
            return Ok(None);
        };

        match repository.get_file_stats(relative_path).await {
            Ok(Some(repo_fp)) if repo_fp.hash == current.hash => {}
            Ok(_) => return Ok(None), // absent in repository, or diverged
            Err(e) => {
                warn!(
                    "failed to fingerprint repository copy of {}: {}",
                    relative_path, e
                );
                return Ok(None);
            }
        }

        match repository.get_info(info_type, relative_path).await {
            Ok(Some(data)) => {
                let entry = CacheEntry::new(absolute, current.clone(), data.clone());
                self.cache.store.write(cache_path, &entry).await;
                debug!(
                    "promoted {}:{} from repository into worktree cache",
                    info_type, relative_path
                );
                Ok(Some(data))
            }
            Ok(None) => Ok(None),
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(
                    "repository lookup for {}:{} failed, computing locally: {}",
                    info_type, relative_path, e
                );
                Ok(None)
            }
        }
    }

    /// Read a file under this context's root.
    ///
    /// `Ok(None)` on not-found; other I/O errors propagate.
    pub async fn get_file_content(&self, relative_path: &str) -> Result<Option<String>> {
        match tokio::fs::read_to_string(self.root.join(relative_path)).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Fingerprint a file against the repository root.
    ///
    /// Repository contexts only; worktrees must not answer for the
    /// canonical copy.
    pub async fn get_file_stats(&self, relative_path: &str) -> Result<Option<Fingerprint>> {
        if self.is_worktree() {
            return Err(QuillError::InvalidContext(
                "get_file_stats is only valid on a repository context".into(),
            ));
        }
        fingerprint(&self.root.join(relative_path)).await
    }

    /// Tear down this worktree's cache subtree.
    ///
    /// On a repository context this logs a warning and does nothing;
    /// the repository cache has no teardown hook.
    pub async fn delete_cache(&self) {
        self.cache.store.delete_context_tree(&self.scope()).await;
    }
}

/// The view of a context handed to a provider while its computation is
/// in flight.
///
/// Delegates to the underlying [`FileInfoContext`], but carries the
/// active call chain so a provider's nested `get_info` calls extend
/// cycle detection instead of escaping it.
pub struct ProviderContext<'a> {
    context: &'a FileInfoContext,
    chain: &'a [String],
}

impl ProviderContext<'_> {
    /// Root directory of the calling context.
    pub fn root(&self) -> &Path {
        self.context.root()
    }

    /// Derived info of another type for another (or the same) file.
    ///
    /// Requesting a signature already being computed on this call chain
    /// fails with [`QuillError::CircularDependency`].
    pub async fn get_info(
        &self,
        info_type: &str,
        relative_path: &str,
    ) -> Result<Option<serde_json::Value>> {
        self.context
            .get_info_chained(info_type, relative_path, self.chain)
            .await
    }

    /// Read a file under the calling context's root.
    pub async fn get_file_content(&self, relative_path: &str) -> Result<Option<String>> {
        self.context.get_file_content(relative_path).await
    }
}
