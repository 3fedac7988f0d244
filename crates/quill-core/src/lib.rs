//! # quill-core
//!
//! Core types shared across the Quill workspace: the unified error type,
//! repository-level configuration, and fail-open utilities for
//! infrastructure operations that must degrade gracefully.

mod error;

pub mod config;
pub mod fail_open;

pub use config::QuillConfig;
pub use error::{QuillError, Result};
