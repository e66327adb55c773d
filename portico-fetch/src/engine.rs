//! Retry engine.
//!
//! Wraps any fallible async operation with the breaker for its operation
//! key and the backoff loop from its [`RetryConfig`].

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, instrument, warn};

use crate::breaker::{Admission, BreakerConfig, BreakerRegistry};
use crate::clock::Clock;
use crate::error::FetchError;
use crate::retry::RetryConfig;

/// Releases a half-open trial if the call is dropped before it records an
/// outcome, e.g. when a caller's timeout cancels it.
struct TrialGuard<'a> {
    breakers: &'a BreakerRegistry,
    key: &'a str,
    armed: bool,
}

impl<'a> TrialGuard<'a> {
    fn new(breakers: &'a BreakerRegistry, key: &'a str, admission: Admission) -> Self {
        Self {
            breakers,
            key,
            armed: admission == Admission::Trial,
        }
    }

    fn settle(&mut self) {
        self.armed = false;
    }
}

impl Drop for TrialGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            self.breakers.abandon_trial(self.key);
        }
    }
}

/// Runs operations under per-key circuit breakers with retries.
#[derive(Debug)]
pub struct RetryEngine {
    breakers: BreakerRegistry,
}

impl RetryEngine {
    /// Creates an engine with its own breaker table.
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: BreakerRegistry::new(config, clock),
        }
    }

    /// Returns the breaker table.
    pub fn breakers(&self) -> &BreakerRegistry {
        &self.breakers
    }

    /// Runs `operation` until it succeeds, fails terminally, or runs out of
    /// attempts.
    ///
    /// An open breaker for `operation_key` fails the call with
    /// [`FetchError::CircuitOpen`] without invoking `operation`. A half-open
    /// breaker admits a single attempt; if that attempt is cancelled the
    /// breaker re-opens with a fresh cool-down.
    #[instrument(skip(self, config, operation), fields(key = %operation_key))]
    pub async fn execute_with_retry<T, F, Fut>(
        &self,
        operation_key: &str,
        config: &RetryConfig,
        mut operation: F,
    ) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let admission = self.breakers.admit(operation_key)?;
        let max_attempts = match admission {
            Admission::Trial => 1,
            Admission::Normal => config.max_attempts.max(1),
        };

        let mut guard = TrialGuard::new(&self.breakers, operation_key, admission);
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            attempt += 1;
            debug!(attempt, max_attempts, "Running operation");

            match operation().await {
                Ok(value) => {
                    guard.settle();
                    self.breakers.record_success(operation_key);
                    return Ok(value);
                }
                Err(error) if error.is_retryable() && attempt < max_attempts => {
                    let delay = config.delay_for_attempt(attempt, config.sample_jitter());
                    warn!(
                        attempt,
                        error = %error,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(error) => {
                    warn!(
                        attempt,
                        error = %error,
                        retryable = error.is_retryable(),
                        elapsed = ?start.elapsed(),
                        "Operation failed"
                    );
                    guard.settle();
                    self.breakers
                        .record_failure(operation_key, admission, error.is_retryable());
                    return Err(error);
                }
            }
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::CircuitState;
    use crate::clock::ManualClock;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn engine(threshold: u32) -> (RetryEngine, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = BreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_secs(60),
        };
        (RetryEngine::new(config, clock.clone()), clock)
    }

    fn fast_retry(attempts: u32) -> RetryConfig {
        RetryConfig::new(attempts)
            .with_base_delay(Duration::ZERO)
            .with_jitter(Duration::ZERO)
    }

    #[tokio::test]
    async fn test_succeeds_after_retryable_failures() {
        let (engine, _clock) = engine(5);
        let calls = AtomicU32::new(0);

        let result = engine
            .execute_with_retry("op", &fast_retry(3), || async {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FetchError::Network("reset".into()))
                } else {
                    Ok("done")
                }
            })
            .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.breakers().get("op").unwrap().failure_count, 0);
    }

    #[tokio::test]
    async fn test_terminal_error_stops_immediately() {
        let (engine, _clock) = engine(5);
        let calls = AtomicU32::new(0);

        let result: Result<(), _> = engine
            .execute_with_retry("op", &fast_retry(5), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(FetchError::AuthenticationFailed("bad password".into()))
            })
            .await;

        assert!(result.unwrap_err().is_authentication());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_increments_breaker() {
        let (engine, _clock) = engine(5);

        let result: Result<(), _> = engine
            .execute_with_retry("op", &fast_retry(2), || async {
                Err(FetchError::UpstreamStatus {
                    status: 502,
                    context: "test".into(),
                })
            })
            .await;

        assert!(matches!(result, Err(FetchError::UpstreamStatus { status: 502, .. })));
        assert_eq!(engine.breakers().get("op").unwrap().failure_count, 1);
    }

    #[tokio::test]
    async fn test_open_breaker_skips_operation_until_cooldown() {
        let (engine, clock) = engine(2);
        let calls = AtomicU32::new(0);
        let config = fast_retry(1);

        for _ in 0..2 {
            let _ = engine
                .execute_with_retry("op", &config, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(FetchError::Network("down".into()))
                })
                .await;
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        let rejected = engine
            .execute_with_retry("op", &config, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await;
        assert!(rejected.unwrap_err().is_circuit_open());
        assert_eq!(calls.load(Ordering::SeqCst), 2);

        clock.advance(Duration::from_secs(60));
        engine
            .execute_with_retry("op", &config, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(engine.breakers().get("op").unwrap().state, CircuitState::Closed);
    }

    #[tokio::test]
    async fn test_half_open_trial_gets_single_attempt() {
        let (engine, clock) = engine(1);
        let calls = AtomicU32::new(0);

        let _ = engine
            .execute_with_retry("op", &fast_retry(1), || async {
                Err::<(), _>(FetchError::Network("down".into()))
            })
            .await;
        clock.advance(Duration::from_secs(60));

        let result = engine
            .execute_with_retry("op", &fast_retry(5), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<(), _>(FetchError::Network("still down".into()))
            })
            .await;

        assert!(matches!(result, Err(FetchError::Network(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(engine.breakers().get("op").unwrap().state, CircuitState::Open);
    }

    #[tokio::test]
    async fn test_cancelled_trial_does_not_wedge_breaker() {
        let (engine, clock) = engine(1);

        let _ = engine
            .execute_with_retry("op", &fast_retry(1), || async {
                Err::<(), _>(FetchError::Network("down".into()))
            })
            .await;
        clock.advance(Duration::from_secs(60));

        let cancelled = tokio::time::timeout(
            Duration::from_millis(10),
            engine.execute_with_retry("op", &fast_retry(1), || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok::<_, FetchError>(())
            }),
        )
        .await;
        assert!(cancelled.is_err());

        let state = engine.breakers().get("op").unwrap();
        assert_eq!(state.state, CircuitState::Open);
        assert!(!state.trial_in_flight);

        clock.advance(Duration::from_secs(3600));
        engine
            .execute_with_retry("op", &fast_retry(1), || async { Ok::<_, FetchError>(()) })
            .await
            .unwrap();
        assert_eq!(engine.breakers().get("op").unwrap().state, CircuitState::Closed);
    }
}
