//! # quill-cache
//!
//! Content-addressed cache for expensive per-file analysis results,
//! shared between the canonical repository checkout and any number of
//! isolated worktrees holding modified copies of the same files.
//!
//! ## Core pieces
//!
//! - [`Fingerprint`]: the `{mtime, size, hash}` triple used for
//!   staleness detection.
//! - [`CacheStore`]: maps `(scope, info type, relative path)` to a cache
//!   file on disk and reads/writes JSON entries.
//! - [`InfoProvider`] / [`ProviderRegistry`]: pluggable extractors keyed
//!   by info-type string, registered once at startup.
//! - [`FileInfoCache`] / [`FileInfoContext`]: the orchestrator. One
//!   `FileInfoCache` exists per repository root and is injected into
//!   every context; contexts answer `get_info` lookups, promoting
//!   repository results into worktrees when file content is identical.

mod context;
mod fingerprint;
mod registry;
mod store;

pub use context::{FileInfoCache, FileInfoContext, ProviderContext};
pub use fingerprint::{fingerprint, Fingerprint};
pub use registry::{InfoProvider, ProviderRegistry, ProviderRegistryBuilder};
pub use store::{CacheEntry, CacheMetadata, CacheScope, CacheStore};
