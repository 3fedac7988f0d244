//! Configuration management for Quill
//!
//! Repository-level settings loaded from `.quill/config.toml` in the repo
//! root: cache layout and logging defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::Result;

/// Repository-level Quill configuration
///
/// Loaded from `.quill/config.toml` in the repo root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuillConfig {
    /// Derived-info cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Default tracing filter when RUST_LOG is unset
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

/// Derived-info cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache root, relative to the repository root
    #[serde(default = "default_cache_dir")]
    pub dir: String,
}

// Default value providers
fn default_cache_dir() -> String {
    ".quill/cache".to_string()
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
        }
    }
}

impl Default for QuillConfig {
    fn default() -> Self {
        Self {
            cache: CacheConfig::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl QuillConfig {
    /// Load configuration from `.quill/config.toml` or use defaults
    pub fn load_or_default(repo_root: &Path) -> Result<Self> {
        let config_path = repo_root.join(".quill/config.toml");

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            Ok(toml::from_str(&content).map_err(|e| {
                crate::QuillError::Config(format!("Failed to parse config file: {}", e))
            })?)
        } else {
            Ok(Self::default())
        }
    }

    /// Write default configuration to `.quill/config.toml`
    pub fn write_default(repo_root: &Path) -> Result<()> {
        let config_dir = repo_root.join(".quill");
        std::fs::create_dir_all(&config_dir)?;

        let config_path = config_dir.join("config.toml");
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| crate::QuillError::Config(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(&config_path, content)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_when_no_config_file() {
        let dir = tempdir().unwrap();
        let config = QuillConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.cache.dir, ".quill/cache");
        assert_eq!(config.log_filter, "info");
    }

    #[test]
    fn round_trips_written_defaults() {
        let dir = tempdir().unwrap();
        QuillConfig::write_default(dir.path()).unwrap();
        let config = QuillConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.cache.dir, ".quill/cache");
    }

    #[test]
    fn partial_config_fills_defaults() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join(".quill")).unwrap();
        std::fs::write(
            dir.path().join(".quill/config.toml"),
            "[cache]\ndir = \".analysis\"\n",
        )
        .unwrap();

        let config = QuillConfig::load_or_default(dir.path()).unwrap();
        assert_eq!(config.cache.dir, ".analysis");
        assert_eq!(config.log_filter, "info");
    }
}
