//! Retry utility for transient failures in async HTTP calls

use std::time::Duration;
use tokio::time::sleep;

/// Fixed-delay retry policy
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Build a policy from a retry count as written in configuration.
    ///
    /// `retries` counts additional attempts, so `0` means a single attempt.
    pub fn with_retries(retries: usize, delay: Duration) -> Self {
        Self {
            max_attempts: retries + 1,
            delay,
        }
    }

    pub fn no_retry() -> Self {
        Self::with_retries(0, Duration::ZERO)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// the policy's attempts are exhausted. The last error is returned.
///
/// # Examples
/// ```rust
/// use asset_producer::core::retry::{retry_async, RetryPolicy};
///
/// # async fn example() -> Result<u32, String> {
/// let page = retry_async(
///     "fetch_page",
///     &RetryPolicy::default(),
///     || async { Ok::<u32, String>(3) },
///     |_err| true,
/// )
/// .await?;
/// # Ok(page)
/// # }
/// ```
pub async fn retry_async<F, T, E, Fut, P>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt >= max_attempts || !should_retry(&error) {
                    return Err(error);
                }
                log::debug!(
                    "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                    operation_name,
                    attempt,
                    max_attempts,
                    policy.delay,
                    error
                );
                sleep(policy.delay).await;
            }
        }
    }
}
