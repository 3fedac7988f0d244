//! Pluggable analysis providers
//!
//! A provider computes one kind of derived data (an "info type") for a
//! file. Providers are registered once at startup through
//! [`ProviderRegistryBuilder`]; the built registry is immutable and
//! shared by every context rooted at the same repository.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use quill_core::{QuillError, Result};

use crate::context::ProviderContext;

/// A pluggable extractor for one info type.
///
/// Providers are stateless with respect to the cache: the orchestrator
/// alone decides when to call them and persists their results. A
/// provider may call back into the context (`get_file_content`, or
/// `get_info` for *other* info types) while computing; re-entering the
/// computation it is part of is caught by cycle detection, which the
/// [`ProviderContext`] carries through nested calls.
#[async_trait]
pub trait InfoProvider: Send + Sync {
    /// Compute derived data for `relative_path`, or `None` when the file
    /// yields nothing for this info type.
    async fn extract_info(
        &self,
        relative_path: &str,
        context: &ProviderContext<'_>,
    ) -> Result<Option<serde_json::Value>>;
}

/// Immutable info-type → provider table, built once at startup.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn InfoProvider>>,
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::default()
    }

    pub fn lookup(&self, info_type: &str) -> Option<Arc<dyn InfoProvider>> {
        self.providers.get(info_type).cloned()
    }

    /// Registered info types, for diagnostics
    pub fn info_types(&self) -> impl Iterator<Item = &str> {
        self.providers.keys().map(String::as_str)
    }
}

/// Builder that validates the provider table before any lookup happens.
///
/// Registering the same info type twice is an error rather than a
/// logged overwrite: provider wiring is startup configuration and a
/// duplicate means two subsystems disagree about who owns the key.
#[derive(Default)]
pub struct ProviderRegistryBuilder {
    providers: HashMap<String, Arc<dyn InfoProvider>>,
}

impl ProviderRegistryBuilder {
    pub fn register(
        mut self,
        info_type: impl Into<String>,
        provider: Arc<dyn InfoProvider>,
    ) -> Result<Self> {
        let info_type = info_type.into();
        if self.providers.contains_key(&info_type) {
            return Err(QuillError::DuplicateProvider(info_type));
        }
        self.providers.insert(info_type, provider);
        Ok(self)
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}
