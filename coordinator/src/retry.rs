//! Retry policy for post-write view refreshes.

use std::future::Future;
use std::time::Duration;

use stakeview_views::RefreshOutcome;

/// Default number of refresh attempts (first try included).
pub const DEFAULT_ATTEMPTS: u32 = 3;

/// Default delay before the first retry (ms).
pub const DEFAULT_INITIAL_BACKOFF_MS: u64 = 500;

/// Default upper bound on the delay between retries (ms).
pub const DEFAULT_MAX_BACKOFF_MS: u64 = 4_000;

/// How often and how patiently a failed refresh is retried. The delay
/// doubles after every failed attempt up to `max_backoff`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefreshPolicy {
    pub attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self {
            attempts: DEFAULT_ATTEMPTS,
            initial_backoff: Duration::from_millis(DEFAULT_INITIAL_BACKOFF_MS),
            max_backoff: Duration::from_millis(DEFAULT_MAX_BACKOFF_MS),
        }
    }
}

impl RefreshPolicy {
    /// A single attempt, no retries.
    pub fn once() -> Self {
        Self {
            attempts: 1,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after the `failed`-th failed attempt (1-based).
    pub fn backoff(&self, failed: u32) -> Duration {
        let factor = 1u32.checked_shl(failed.saturating_sub(1)).unwrap_or(u32::MAX);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Run `refresh` until it does not fail, fails with a non-transient
    /// error, or the attempts are used up. Returns the last outcome.
    pub async fn run<F, Fut>(&self, view: &str, mut refresh: F) -> RefreshOutcome
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = RefreshOutcome>,
    {
        let attempts = self.attempts.max(1);
        let mut attempt = 1;
        loop {
            let outcome = refresh().await;
            let RefreshOutcome::Failed(err) = &outcome else {
                return outcome;
            };
            if attempt >= attempts || !err.is_transient() {
                return outcome;
            }
            let delay = self.backoff(attempt);
            tracing::warn!(view, attempt, error = %err, delay_ms = delay.as_millis() as u64, "retrying view refresh");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}
