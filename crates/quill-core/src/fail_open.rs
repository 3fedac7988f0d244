//! Fail-open utilities for graceful degradation
//!
//! Used for infrastructure operations that should never fail the caller's
//! logical operation: cache persistence, cache-tree cleanup, telemetry.
//!
//! DO NOT use fail-open for:
//! - Fingerprinting the file being analyzed (staleness correctness)
//! - Context construction (invariant checks)
//! - Cycle detection (must propagate)

use std::future::Future;
use tracing::warn;

use crate::Result;

/// Execute an operation that should fail open (infrastructure, not business logic)
///
/// Logs the error via `tracing::warn!` on failure and returns `None`.
pub async fn fail_open<F, Fut, T>(operation_name: &str, f: F) -> Option<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    match f().await {
        Ok(val) => Some(val),
        Err(e) => {
            warn!("{} failed (fail-open): {}", operation_name, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QuillError;

    #[tokio::test]
    async fn returns_value_on_success() {
        let result = fail_open("noop", || async { Ok(42) }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn swallows_errors() {
        let result: Option<()> = fail_open("boom", || async {
            Err(QuillError::Other("expected".into()))
        })
        .await;
        assert!(result.is_none());
    }
}
