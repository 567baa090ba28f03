//! Three-state circuit breaker guarding calls to a downstream service (spec §4.C1).
//!
//! Closed → Open when the error ratio over a sliding `monitor_window` strictly
//! exceeds `error_ratio`. Open → HalfOpen after `broken_time` elapses, admitting
//! exactly one probe. A probe success closes the breaker; a probe failure
//! reopens it.

use std::collections::VecDeque;
use std::future::Future;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::CircuitBreakerConfig;
use crate::error::Error;

/// Observable state of a [`CircuitBreaker`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Calls pass through normally.
    Closed,
    /// Calls fail fast with [`Error::CircuitBroken`].
    Open,
    /// A single probe call is admitted to test recovery.
    HalfOpen,
}

struct Inner {
    state: CircuitState,
    window: VecDeque<(Instant, bool)>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
}

impl Default for Inner {
    fn default() -> Self {
        Self { state: CircuitState::Closed, window: VecDeque::new(), opened_at: None, probe_in_flight: false }
    }
}

/// Per-service circuit breaker. One instance guards one downstream client.
pub struct CircuitBreaker {
    service: String,
    config: CircuitBreakerConfig,
    inner: RwLock<Inner>,
}

/// Whether a call was admitted, and if so, whether it is the single HalfOpen probe.
enum Admission {
    Rejected,
    Allowed,
}

impl CircuitBreaker {
    /// Builds a breaker for the named downstream service.
    #[must_use]
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self { service: service.into(), config, inner: RwLock::new(Inner::default()) }
    }

    /// Current breaker state.
    pub async fn state(&self) -> CircuitState {
        self.inner.read().await.state
    }

    async fn admit(&self) -> Admission {
        let mut inner = self.inner.write().await;
        match inner.state {
            CircuitState::Closed => Admission::Allowed,
            CircuitState::Open => {
                let elapsed = inner.opened_at.map(|t| t.elapsed()).unwrap_or(Duration::MAX);
                if elapsed >= self.config.broken_time() {
                    info!(service = %self.service, "circuit transitioning to half-open, admitting probe");
                    inner.state = CircuitState::HalfOpen;
                    inner.probe_in_flight = true;
                    Admission::Allowed
                } else {
                    Admission::Rejected
                }
            }
            CircuitState::HalfOpen => {
                if inner.probe_in_flight {
                    Admission::Rejected
                } else {
                    inner.probe_in_flight = true;
                    Admission::Allowed
                }
            }
        }
    }

    fn prune(window: &mut VecDeque<(Instant, bool)>, now: Instant, monitor_window: Duration) {
        while let Some(&(ts, _)) = window.front() {
            if now.duration_since(ts) > monitor_window {
                window.pop_front();
            } else {
                break;
            }
        }
    }

    async fn record(&self, success: bool) {
        let mut inner = self.inner.write().await;
        let now = Instant::now();

        match inner.state {
            CircuitState::Closed => {
                inner.window.push_back((now, success));
                Self::prune(&mut inner.window, now, self.config.monitor_window());
                let total = inner.window.len();
                let failures = inner.window.iter().filter(|(_, ok)| !ok).count();
                if total > 0 {
                    let ratio = failures as f64 / total as f64;
                    if ratio > self.config.error_ratio {
                        warn!(service = %self.service, ratio, "circuit opening: error ratio exceeded");
                        inner.state = CircuitState::Open;
                        inner.opened_at = Some(now);
                        inner.window.clear();
                    }
                }
            }
            CircuitState::HalfOpen => {
                inner.probe_in_flight = false;
                if success {
                    info!(service = %self.service, "circuit closing after successful probe");
                    inner.state = CircuitState::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                } else {
                    warn!(service = %self.service, "circuit reopening after failed probe");
                    inner.state = CircuitState::Open;
                    inner.opened_at = Some(now);
                }
            }
            CircuitState::Open => {
                // A lingering result from before the breaker opened; ignore.
            }
        }
    }

    /// Runs `operation` if the breaker admits the call, recording its outcome.
    /// Only [`Error::is_recoverable`] failures count toward the error ratio.
    ///
    /// # Errors
    /// Returns [`Error::CircuitBroken`] without running `operation` when the
    /// breaker is open (or a probe is already in flight in HalfOpen).
    pub async fn call<F, Fut, T>(&self, operation: F) -> Result<T, Error>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, Error>>,
    {
        match self.admit().await {
            Admission::Rejected => return Err(Error::CircuitBroken { service: self.service.clone() }),
            Admission::Allowed => {}
        }

        let result = operation().await;
        match &result {
            Ok(_) => self.record(true).await,
            Err(err) if err.is_recoverable() => self.record(false).await,
            Err(_) => {}
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig { error_ratio: 0.5, monitor_window_secs: 60, broken_time_secs: 0 }
    }

    fn transient() -> Error {
        Error::Transient { service: "chronicle".into(), message: "boom".into() }
    }

    #[tokio::test]
    async fn stays_closed_below_error_ratio() {
        let cb = CircuitBreaker::new("chronicle", test_config());
        for _ in 0..3 {
            let _ = cb.call(|| async { Ok::<_, Error>(()) }).await;
        }
        let _ = cb.call(|| async { Err::<(), _>(transient()) }).await;
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn opens_when_ratio_strictly_exceeds_threshold() {
        let cb = CircuitBreaker::new("chronicle", test_config());
        let _ = cb.call(|| async { Ok::<_, Error>(()) }).await;
        let _ = cb.call(|| async { Err::<(), _>(transient()) }).await;
        let _ = cb.call(|| async { Err::<(), _>(transient()) }).await;
        assert_eq!(cb.state().await, CircuitState::Open);
    }

    #[tokio::test]
    async fn open_breaker_fails_fast_without_running_operation() {
        let cb = CircuitBreaker::new("chronicle", test_config());
        let _ = cb.call(|| async { Err::<(), _>(transient()) }).await;
        let _ = cb.call(|| async { Err::<(), _>(transient()) }).await;
        assert_eq!(cb.state().await, CircuitState::Open);

        let ran = AtomicU32::new(0);
        let result = cb
            .call(|| async {
                ran.fetch_add(1, Ordering::SeqCst);
                Ok::<_, Error>(())
            })
            .await;
        // broken_time_secs = 0 means the very next call is admitted as a probe.
        assert!(result.is_ok());
        assert_eq!(ran.load(Ordering::SeqCst), 1);
        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[tokio::test]
    async fn half_open_admits_only_one_probe_concurrently() {
        let cb = CircuitBreaker::new("chronicle", CircuitBreakerConfig {
            error_ratio: 0.5,
            monitor_window_secs: 60,
            broken_time_secs: 3600,
        });
        let _ = cb.call(|| async { Err::<(), _>(transient()) }).await;
        let _ = cb.call(|| async { Err::<(), _>(transient()) }).await;
        assert_eq!(cb.state().await, CircuitState::Open);
        // broken_time has not elapsed; still rejected without running.
        let result = cb.call(|| async { Ok::<_, Error>(()) }).await;
        assert!(matches!(result, Err(Error::CircuitBroken { .. })));
    }

    #[tokio::test]
    async fn non_recoverable_errors_do_not_affect_ratio() {
        let cb = CircuitBreaker::new("project", test_config());
        for _ in 0..5 {
            let _ = cb
                .call(|| async { Err::<(), _>(Error::NotFound("P1".into())) })
                .await;
        }
        assert_eq!(cb.state().await, CircuitState::Closed);
    }
}
