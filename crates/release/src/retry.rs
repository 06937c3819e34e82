//! Retry budget and exponential backoff for transient publish failures.

use crate::config::PublishSettings;
use crate::error::Result;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry budget and backoff. The delay doubles each retry up to
/// `max_delay`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Delay cap.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&PublishSettings::default())
    }
}

impl RetryPolicy {
    /// Policy from the `[publish]` table.
    #[must_use]
    pub const fn from_settings(settings: &PublishSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            base_delay: Duration::from_millis(settings.retry_base_delay_ms),
            max_delay: Duration::from_millis(settings.retry_max_delay_ms),
        }
    }

    /// Delay before retry number `retry` (1-indexed), capped at `max_delay`.
    #[must_use]
    pub fn delay(&self, retry: u32) -> Duration {
        let pow = retry.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(2_u32.saturating_pow(pow))
            .min(self.max_delay)
    }

    /// Run `operation` until it succeeds, fails with a non-transient error,
    /// or the budget is spent. The closure receives the 1-indexed attempt.
    ///
    /// # Errors
    ///
    /// Returns the last error.
    pub async fn run<T, F, Fut>(&self, name: &str, mut operation: F) -> Result<T>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt <= self.max_retries => {
                    let delay = self.delay(attempt);
                    warn!(
                        operation = name,
                        attempt,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_delays() {
        let p = policy();
        assert_eq!(p.delay(1), Duration::from_secs(1));
        assert_eq!(p.delay(2), Duration::from_secs(2));
        assert_eq!(p.delay(3), Duration::from_secs(4));
        assert_eq!(p.delay(4), Duration::from_secs(5));
        assert_eq!(p.delay(40), Duration::from_secs(5));
    }

    #[test]
    fn test_from_settings() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_retries, 3);
        assert_eq!(p.base_delay, Duration::from_secs(2));
        assert_eq!(p.max_delay, Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let value = policy()
            .run("push", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Err(Error::backend("git", "connection reset"))
                    } else {
                        Ok(attempt)
                    }
                }
            })
            .await
            .unwrap();
        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_permanent_error_and_budget() {
        let calls = AtomicU32::new(0);
        let err = policy()
            .run("push", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::git("rejected")) }
            })
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Git { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls = AtomicU32::new(0);
        policy()
            .run("push", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Error::backend("git", "timeout")) }
            })
            .await
            .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }
}
