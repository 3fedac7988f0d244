//! Quill CLI - LLM-driven repository editing with cached file analysis
//!
//! Usage:
//!   quill init                        Initialize Quill in current repo
//!   quill info <type> <path>          Show derived info for a file
//!   quill stats <path>                Show the repository fingerprint of a file
//!   quill clear-cache <worktree>      Drop one worktree's cache subtree

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::DateTime;
use clap::{Parser, Subcommand};
use quill_cache::{FileInfoCache, FileInfoContext, InfoProvider, ProviderContext, ProviderRegistry};
use quill_core::QuillConfig;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "quill")]
#[command(author, version, about = "LLM-driven repository editing")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Repository root (defaults to current directory)
    #[arg(long, default_value = ".")]
    repo: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize Quill in the repository
    Init,

    /// Show derived info of the given type for a file
    Info {
        /// Info type (e.g. "lines", "outline")
        info_type: String,

        /// Path relative to the repository (or worktree) root
        path: String,

        /// Resolve against a worktree instead of the repository
        #[arg(long, value_name = "DIR")]
        worktree: Option<PathBuf>,
    },

    /// Show the repository fingerprint of a file
    Stats {
        /// Path relative to the repository root
        path: String,
    },

    /// Drop the cache subtree belonging to one worktree
    ClearCache {
        /// Worktree root directory
        worktree: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let repo_root = cli
        .repo
        .canonicalize()
        .with_context(|| format!("Repository root not found: {}", cli.repo.display()))?;

    match cli.command {
        Commands::Init => {
            QuillConfig::write_default(&repo_root)?;
            info!("Initialized Quill in {}", repo_root.display());
            Ok(())
        }
        Commands::Info {
            info_type,
            path,
            worktree,
        } => cmd_info(&repo_root, &info_type, &path, worktree).await,
        Commands::Stats { path } => cmd_stats(&repo_root, &path).await,
        Commands::ClearCache { worktree } => cmd_clear_cache(&repo_root, worktree).await,
    }
}

fn build_cache(repo_root: &PathBuf) -> Result<Arc<FileInfoCache>> {
    let config = QuillConfig::load_or_default(repo_root)?;
    let registry = ProviderRegistry::builder()
        .register("lines", Arc::new(LineCountProvider))?
        .register("outline", Arc::new(OutlineProvider))?
        .build();
    Ok(FileInfoCache::with_config(
        repo_root.clone(),
        registry,
        &config.cache,
    ))
}

async fn cmd_info(
    repo_root: &PathBuf,
    info_type: &str,
    path: &str,
    worktree: Option<PathBuf>,
) -> Result<()> {
    let cache = build_cache(repo_root)?;
    let repo_ctx = cache.repository_context();

    let ctx = match worktree {
        Some(dir) => {
            let dir = dir
                .canonicalize()
                .with_context(|| format!("Worktree not found: {}", dir.display()))?;
            FileInfoContext::worktree(dir, repo_ctx)?
        }
        None => repo_ctx,
    };

    match ctx.get_info(info_type, path).await? {
        Some(data) => {
            println!("{}", serde_json::to_string_pretty(&data)?);
            Ok(())
        }
        None => {
            let mut known: Vec<_> = cache.registry().info_types().collect();
            known.sort_unstable();
            bail!(
                "no {} analysis available for {} (known info types: {})",
                info_type,
                path,
                known.join(", ")
            )
        }
    }
}

async fn cmd_stats(repo_root: &PathBuf, path: &str) -> Result<()> {
    let cache = build_cache(repo_root)?;
    let ctx = cache.repository_context();

    match ctx.get_file_stats(path).await? {
        Some(fp) => {
            let modified = DateTime::from_timestamp_millis(fp.mtime)
                .map(|t| t.to_rfc3339())
                .unwrap_or_else(|| fp.mtime.to_string());
            println!("path:     {}", path);
            println!("size:     {} bytes", fp.size);
            println!("modified: {}", modified);
            println!("sha256:   {}", fp.hash);
            Ok(())
        }
        None => bail!("{} is not a regular file in the repository", path),
    }
}

async fn cmd_clear_cache(repo_root: &PathBuf, worktree: PathBuf) -> Result<()> {
    let worktree = worktree
        .canonicalize()
        .with_context(|| format!("Worktree not found: {}", worktree.display()))?;

    let cache = build_cache(repo_root)?;
    let ctx = FileInfoContext::worktree(&worktree, cache.repository_context())?;
    ctx.delete_cache().await;
    info!("Cleared cache for worktree {}", worktree.display());
    Ok(())
}

/// Built-in provider: line and byte counts.
struct LineCountProvider;

#[async_trait]
impl InfoProvider for LineCountProvider {
    async fn extract_info(
        &self,
        relative_path: &str,
        context: &ProviderContext<'_>,
    ) -> quill_core::Result<Option<serde_json::Value>> {
        let Some(content) = context.get_file_content(relative_path).await? else {
            return Ok(None);
        };
        Ok(Some(json!({
            "lines": content.lines().count(),
            "bytes": content.len(),
        })))
    }
}

/// Built-in provider: a rough top-level declaration outline.
///
/// Line-prefix matching only; good enough to give the agent loop an
/// overview of a file without a language-aware parser.
struct OutlineProvider;

const OUTLINE_PREFIXES: &[&str] = &[
    "fn ",
    "pub fn ",
    "struct ",
    "pub struct ",
    "enum ",
    "pub enum ",
    "trait ",
    "pub trait ",
    "impl ",
    "class ",
    "function ",
    "export ",
    "def ",
];

#[async_trait]
impl InfoProvider for OutlineProvider {
    async fn extract_info(
        &self,
        relative_path: &str,
        context: &ProviderContext<'_>,
    ) -> quill_core::Result<Option<serde_json::Value>> {
        let Some(content) = context.get_file_content(relative_path).await? else {
            return Ok(None);
        };

        let declarations: Vec<serde_json::Value> = content
            .lines()
            .enumerate()
            .filter(|(_, line)| {
                OUTLINE_PREFIXES
                    .iter()
                    .any(|prefix| line.starts_with(prefix))
            })
            .map(|(i, line)| json!({ "line": i + 1, "text": line.trim_end() }))
            .collect();

        if declarations.is_empty() {
            return Ok(None);
        }
        Ok(Some(json!({ "declarations": declarations })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_cache(root: &std::path::Path) -> Arc<FileInfoCache> {
        let registry = ProviderRegistry::builder()
            .register("lines", Arc::new(LineCountProvider))
            .unwrap()
            .register("outline", Arc::new(OutlineProvider))
            .unwrap()
            .build();
        FileInfoCache::new(root, registry)
    }

    #[tokio::test]
    async fn line_count_provider_counts() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo\n").unwrap();

        let ctx = test_cache(dir.path()).repository_context();
        let data = ctx.get_info("lines", "a.txt").await.unwrap().unwrap();
        assert_eq!(data["lines"], 2);
        assert_eq!(data["bytes"], 8);
    }

    #[tokio::test]
    async fn outline_provider_finds_declarations() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("lib.rs"),
            "use std::fmt;\n\npub struct Foo;\n\nfn helper() {}\n",
        )
        .unwrap();

        let ctx = test_cache(dir.path()).repository_context();
        let data = ctx.get_info("outline", "lib.rs").await.unwrap().unwrap();
        let decls = data["declarations"].as_array().unwrap();
        assert_eq!(decls.len(), 2);
        assert_eq!(decls[0]["line"], 3);
        assert_eq!(decls[1]["text"], "fn helper() {}");
    }

    #[tokio::test]
    async fn outline_provider_yields_nothing_for_prose() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "just some notes\n").unwrap();

        let ctx = test_cache(dir.path()).repository_context();
        assert!(ctx.get_info("outline", "notes.md").await.unwrap().is_none());
    }
}
