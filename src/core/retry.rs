//! Retry utility for transient failures in async collaborator calls

use std::time::Duration;
use tokio::time::sleep;

/// Retry policy with a fixed inter-attempt delay
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: usize,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            // At least one attempt always runs
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Execute an async operation, retrying on error up to the policy limit.
///
/// Attempt failures below the limit log at debug level; the final error is
/// returned to the caller unchanged.
pub async fn retry_async<F, T, E, Fut>(
    operation_name: &str,
    policy: RetryPolicy,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempt < policy.max_attempts - 1 {
                    log::debug!(
                        "Operation '{}' failed on attempt {}/{}, retrying in {:?}: {}",
                        operation_name,
                        attempt + 1,
                        policy.max_attempts,
                        policy.delay,
                        error
                    );
                    sleep(policy.delay).await;
                }
                last_error = Some(error);
            }
        }
    }

    Err(last_error.expect("at least one attempt"))
}
