//! Retry wrapper for write paths that scheduler tasks hit concurrently.
//!
//! The fetch sweep, the enrichment worker, and job status updates can all
//! write at the same time; SQLITE_BUSY surfaces as a transient error that
//! is safe to retry with backoff.

use std::future::Future;
use std::time::Duration;

/// Maximum number of retry attempts for database write operations
pub const MAX_RETRIES: u32 = 5;

/// Check if a SQLite error is transient and should be retried
pub fn is_transient_error(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => {
            let code = db_err.code().map(|c| c.to_string());
            matches!(
                code.as_deref(),
                Some("5")      // SQLITE_BUSY
                | Some("6")    // SQLITE_LOCKED
                | Some("1032") // SQLITE_BUSY_SNAPSHOT
            )
        }
        _ => false,
    }
}

/// Exponential backoff delay: 100ms doubling per attempt
fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_millis(100 * 2u64.pow(attempt.saturating_sub(1)))
}

/// Execute a write operation, retrying transient lock errors with backoff
pub async fn execute_with_retry<F, Fut>(operation: F) -> std::result::Result<(), sqlx::Error>
where
    F: Fn() -> Fut,
    Fut: Future<Output = std::result::Result<(), sqlx::Error>>,
{
    let mut attempts = 0;
    loop {
        match operation().await {
            Ok(_) => return Ok(()),
            Err(e) if is_transient_error(&e) && attempts < MAX_RETRIES => {
                attempts += 1;
                let delay = backoff_delay(attempts);
                tracing::debug!(
                    error = %e,
                    attempt = attempts,
                    delay_ms = delay.as_millis(),
                    "Database busy, retrying write"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_delay() {
        assert_eq!(backoff_delay(1), Duration::from_millis(100));
        assert_eq!(backoff_delay(2), Duration::from_millis(200));
        assert_eq!(backoff_delay(3), Duration::from_millis(400));
    }

    #[tokio::test]
    async fn test_non_transient_error_not_retried() {
        use std::sync::atomic::{AtomicU32, Ordering};

        let calls = AtomicU32::new(0);
        let result = execute_with_retry(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(sqlx::Error::RowNotFound) }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
