//! Bounded retry policies kept separate from lifecycle logic.
//!
//! Every fallible remote interaction in this crate is wrapped in a
//! [`RetryPolicy`] describing how many attempts to make, how long to sleep
//! between them, and whether failed attempts are logged. The policy stays
//! external to the operations it wraps so callers can tune polling speed
//! (tests use millisecond intervals).

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Bounded retry policy: attempt count, fixed sleep between attempts, and
/// whether failed attempts are logged.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RetryPolicy {
    /// Total number of attempts before giving up (at least one).
    pub max_attempts: u32,
    /// Fixed sleep between attempts.
    pub poll_interval: Duration,
    /// Whether failed attempts are logged. Quiet policies suit probes that
    /// are expected to fail many times before the first success.
    pub log_errors: bool,
}

impl RetryPolicy {
    /// Creates a policy that logs failed attempts.
    #[must_use]
    pub const fn new(max_attempts: u32, poll_interval: Duration) -> Self {
        Self {
            max_attempts,
            poll_interval,
            log_errors: true,
        }
    }

    /// Disables per-attempt logging.
    #[must_use]
    pub const fn quiet(mut self) -> Self {
        self.log_errors = false;
        self
    }
}

/// Runs `op` until it succeeds or the policy's attempt budget is exhausted,
/// sleeping between attempts. The last error is returned on exhaustion.
///
/// # Errors
///
/// Returns the final error produced by `op` once `policy.max_attempts`
/// attempts have failed.
pub async fn retry<T, E, F, Fut>(policy: RetryPolicy, action: &str, op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    retry_if(policy, action, |_| true, op).await
}

/// Like [`retry`], but only errors accepted by `should_retry` consume
/// further attempts; any other error is returned immediately.
///
/// # Errors
///
/// Returns the first error rejected by `should_retry`, or the final error
/// once the attempt budget is exhausted.
pub async fn retry_if<T, E, F, Fut, P>(
    policy: RetryPolicy,
    action: &str,
    should_retry: P,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
    E: Display,
{
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_attempts && should_retry(&err) => {
                if policy.log_errors {
                    tracing::debug!(action, attempt, error = %err, "attempt failed, retrying");
                }
                sleep(policy.poll_interval).await;
            }
            Err(err) => {
                if policy.log_errors {
                    tracing::warn!(action, attempt, error = %err, "giving up");
                }
                return Err(err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::time::Duration;

    use super::{RetryPolicy, retry, retry_if};

    const FAST: RetryPolicy = RetryPolicy::new(5, Duration::from_millis(1));

    #[tokio::test]
    async fn retry_returns_first_success() {
        let calls = Cell::new(0u32);
        let result: Result<u32, String> = retry(FAST, "test", || async {
            calls.set(calls.get() + 1);
            if calls.get() < 3 {
                Err(String::from("not yet"))
            } else {
                Ok(calls.get())
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn retry_surfaces_last_error_on_exhaustion() {
        let calls = Cell::new(0u32);
        let policy = RetryPolicy::new(2, Duration::from_millis(1)).quiet();
        let result: Result<(), String> = retry(policy, "test", || async {
            calls.set(calls.get() + 1);
            Err(format!("failure {}", calls.get()))
        })
        .await;

        assert_eq!(result, Err(String::from("failure 2")));
        assert_eq!(calls.get(), 2);
    }

    #[tokio::test]
    async fn retry_if_stops_on_non_retryable_errors() {
        let calls = Cell::new(0u32);
        let result: Result<(), String> = retry_if(
            FAST,
            "test",
            |err: &String| err == "transient",
            || async {
                calls.set(calls.get() + 1);
                Err(String::from("fatal"))
            },
        )
        .await;

        assert_eq!(result, Err(String::from("fatal")));
        assert_eq!(calls.get(), 1);
    }
}
