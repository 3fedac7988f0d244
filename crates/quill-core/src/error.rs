//! Unified error types for Quill

use thiserror::Error;

/// Unified error type for all Quill operations
#[derive(Error, Debug)]
pub enum QuillError {
    /// A derived-info computation re-entered itself on the same context.
    ///
    /// Carries the chain of `infoType:relativePath` signatures that was
    /// in flight when the repeated signature was requested again.
    #[error("circular dependency detected: {}", chain.join(" -> "))]
    CircularDependency { chain: Vec<String> },

    /// A context was used for an operation its kind does not support,
    /// or an illegal repository/worktree combination was constructed.
    #[error("invalid context usage: {0}")]
    InvalidContext(String),

    /// An analysis provider failed while computing derived info.
    #[error("provider '{info_type}' failed: {message}")]
    Provider { info_type: String, message: String },

    /// Two providers were registered under the same info type.
    #[error("provider already registered for info type: {0}")]
    DuplicateProvider(String),

    /// Configuration file could not be read or parsed.
    #[error("config error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(String),
}

impl QuillError {
    /// Whether this error must propagate through the orchestrator
    /// instead of being downgraded to a soft `None` result.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            QuillError::CircularDependency { .. } | QuillError::InvalidContext(_)
        )
    }
}

/// Result type alias using QuillError
pub type Result<T> = std::result::Result<T, QuillError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn circular_dependency_names_the_chain() {
        let err = QuillError::CircularDependency {
            chain: vec!["ast:src/a.rs".into(), "ast:src/a.rs".into()],
        };
        assert_eq!(
            err.to_string(),
            "circular dependency detected: ast:src/a.rs -> ast:src/a.rs"
        );
        assert!(err.is_fatal());
    }

    #[test]
    fn provider_errors_are_soft() {
        let err = QuillError::Provider {
            info_type: "ast".into(),
            message: "boom".into(),
        };
        assert!(!err.is_fatal());
    }
}
