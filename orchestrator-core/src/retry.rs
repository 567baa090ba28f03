//! Retry policy with exponential backoff and jitter.
//!
//! Retries do not themselves count toward circuit breaker failure ratios — the
//! breaker only observes the final outcome of [`RetryPolicy::execute`].

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::config::RetryConfig;
use crate::error::Error;

/// Counters tracking how often retries were needed and whether they paid off.
#[derive(Debug, Default)]
pub struct RetryMetrics {
    attempts: AtomicU64,
    recovered: AtomicU64,
    exhausted: AtomicU64,
}

impl RetryMetrics {
    /// Number of retry attempts made (not counting the first try).
    #[must_use]
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::Relaxed)
    }

    /// Number of calls that succeeded only after at least one retry.
    #[must_use]
    pub fn recovered(&self) -> u64 {
        self.recovered.load(Ordering::Relaxed)
    }

    /// Number of calls that exhausted all attempts without succeeding.
    #[must_use]
    pub fn exhausted(&self) -> u64 {
        self.exhausted.load(Ordering::Relaxed)
    }
}

/// Executes an async operation under the configured retry policy (spec §4.C1:
/// at most 3 attempts, exponential backoff base 1s / max 10s, on transient errors).
pub struct RetryPolicy {
    config: RetryConfig,
    metrics: RetryMetrics,
}

impl RetryPolicy {
    /// Builds a policy from the given config.
    #[must_use]
    pub fn new(config: RetryConfig) -> Self {
        Self { config, metrics: RetryMetrics::default() }
    }

    /// Accumulated metrics for this policy instance.
    #[must_use]
    pub fn metrics(&self) -> &RetryMetrics {
        &self.metrics
    }

    fn backoff_delay(&self, attempt: u32) -> Duration {
        let exp_ms = self.config.base_delay().as_millis() as u64 * 2u64.saturating_pow(attempt);
        let capped = exp_ms.min(self.config.max_delay().as_millis() as u64);
        let jitter_ms = rand::random::<f64>() * capped as f64 * 0.25;
        Duration::from_millis(capped + jitter_ms as u64)
    }

    /// Runs `operation`, retrying on [`Error::is_recoverable`] errors up to
    /// `max_attempts`, with exponential backoff between attempts.
    pub async fn execute<F, Fut, T>(&self, operation: F) -> Result<T, Error>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        let mut attempt = 0u32;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        self.metrics.recovered.fetch_add(1, Ordering::Relaxed);
                    }
                    return Ok(value);
                }
                Err(err) => {
                    let exhausted_attempts = attempt + 1 >= self.config.max_attempts;
                    if !err.is_recoverable() || exhausted_attempts {
                        if attempt > 0 {
                            self.metrics.exhausted.fetch_add(1, Ordering::Relaxed);
                        }
                        return Err(err);
                    }
                    attempt += 1;
                    self.metrics.attempts.fetch_add(1, Ordering::Relaxed);
                    let delay = self.backoff_delay(attempt);
                    warn!(attempt, max_attempts = self.config.max_attempts, ?delay, error = %err, "retrying after transient failure");
                    sleep(delay).await;
                }
            }
        }
    }
}
