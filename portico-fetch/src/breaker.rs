//! Per-operation circuit breakers.
//!
//! # States
//!
//! ```text
//! Closed   → Open:     failure_count reaches the threshold
//! Open     → HalfOpen: cool-down elapsed; one trial call is admitted
//! HalfOpen → Closed:   the trial call succeeds
//! HalfOpen → Open:     the trial call fails with a retryable error
//! ```
//!
//! Only retryable failures count towards opening. A terminal error such as
//! a rejected login says nothing about the health of the endpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::clock::{Clock, to_std};
use crate::error::FetchError;
use crate::store::KeyedStore;

// ============================================================================
// State
// ============================================================================

/// Breaker position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CircuitState {
    /// Calls pass through.
    #[default]
    Closed,
    /// Calls fail fast.
    Open,
    /// One trial call decides the next state.
    HalfOpen,
}

/// Breaker bookkeeping for one operation key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CircuitBreakerState {
    /// Consecutive retryable failures.
    pub failure_count: u32,
    /// When the last counted failure happened.
    pub last_failure_time: Option<DateTime<Utc>>,
    /// Current position.
    pub state: CircuitState,
    /// Whether the half-open trial call is still running.
    pub trial_in_flight: bool,
}

/// Thresholds shared by every breaker in a registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the breaker.
    pub failure_threshold: u32,
    /// Time an open breaker waits before admitting a trial.
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(30),
        }
    }
}

/// How a call was let through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// Breaker closed.
    Normal,
    /// Half-open trial; the outcome decides the breaker state.
    Trial,
}

// ============================================================================
// Registry
// ============================================================================

/// Process-lifetime table of breakers, one per operation key.
#[derive(Debug)]
pub struct BreakerRegistry {
    states: KeyedStore<CircuitBreakerState>,
    config: BreakerConfig,
    clock: Arc<dyn Clock>,
}

impl BreakerRegistry {
    /// Creates an empty registry.
    pub fn new(config: BreakerConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            states: KeyedStore::new(),
            config,
            clock,
        }
    }

    /// Returns the thresholds.
    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    /// Decides whether a call for `key` may go out.
    pub fn admit(&self, key: &str) -> Result<Admission, FetchError> {
        let now = self.clock.now();
        let cooldown = self.config.cooldown;

        self.states.update(key, |slot| {
            let state = slot.get_or_insert_with(CircuitBreakerState::default);
            match state.state {
                CircuitState::Closed => Ok(Admission::Normal),
                CircuitState::Open => {
                    let elapsed = state
                        .last_failure_time
                        .map_or(cooldown, |at| to_std(now - at));
                    if elapsed >= cooldown {
                        info!(key = %key, "Breaker half-open, admitting trial call");
                        state.state = CircuitState::HalfOpen;
                        state.trial_in_flight = true;
                        Ok(Admission::Trial)
                    } else {
                        Err(FetchError::CircuitOpen {
                            key: key.to_string(),
                            retry_in: cooldown - elapsed,
                        })
                    }
                }
                CircuitState::HalfOpen if state.trial_in_flight => Err(FetchError::CircuitOpen {
                    key: key.to_string(),
                    retry_in: Duration::ZERO,
                }),
                CircuitState::HalfOpen => {
                    state.trial_in_flight = true;
                    Ok(Admission::Trial)
                }
            }
        })
    }

    /// Records a successful call: the breaker closes and the count resets.
    pub fn record_success(&self, key: &str) {
        self.states.update(key, |slot| {
            if let Some(state) = slot {
                if state.state != CircuitState::Closed {
                    info!(key = %key, "Breaker closed");
                }
            }
            *slot = Some(CircuitBreakerState::default());
        });
    }

    /// Records a failed call.
    pub fn record_failure(&self, key: &str, admission: Admission, retryable: bool) {
        let now = self.clock.now();
        let threshold = self.config.failure_threshold.max(1);

        self.states.update(key, |slot| {
            let state = slot.get_or_insert_with(CircuitBreakerState::default);

            if admission == Admission::Trial {
                state.trial_in_flight = false;
            }
            if !retryable {
                return;
            }

            state.failure_count = state.failure_count.saturating_add(1);
            state.last_failure_time = Some(now);

            match (admission, state.state) {
                (Admission::Trial, _) => {
                    warn!(key = %key, "Trial call failed, breaker re-opened");
                    state.state = CircuitState::Open;
                }
                (Admission::Normal, CircuitState::Closed) if state.failure_count >= threshold => {
                    warn!(
                        key = %key,
                        failures = state.failure_count,
                        "Breaker opened"
                    );
                    state.state = CircuitState::Open;
                }
                _ => {
                    debug!(key = %key, failures = state.failure_count, "Failure recorded");
                }
            }
        });
    }

    /// Releases a half-open trial that ended without an outcome.
    ///
    /// The breaker goes back to open with a fresh cool-down, so the next
    /// trial is admitted once that cool-down elapses.
    pub fn abandon_trial(&self, key: &str) {
        let now = self.clock.now();

        self.states.update(key, |slot| {
            if let Some(state) = slot {
                if state.state == CircuitState::HalfOpen && state.trial_in_flight {
                    warn!(key = %key, "Trial call abandoned, breaker re-opened");
                    state.trial_in_flight = false;
                    state.state = CircuitState::Open;
                    state.last_failure_time = Some(now);
                }
            }
        });
    }

    /// Returns the state for `key`.
    pub fn get(&self, key: &str) -> Option<CircuitBreakerState> {
        self.states.get(key)
    }

    /// Overwrites the state for `key`.
    pub fn set(&self, key: &str, state: CircuitBreakerState) {
        self.states.set(key, state);
    }

    /// Forgets the breaker for `key`.
    pub fn delete(&self, key: &str) -> Option<CircuitBreakerState> {
        self.states.delete(key)
    }

    /// Returns every breaker, sorted by key.
    pub fn snapshot(&self) -> Vec<(String, CircuitBreakerState)> {
        self.states.snapshot()
    }

    /// Closes every breaker.
    pub fn reset_all(&self) {
        self.states.clear();
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn registry(threshold: u32, cooldown_secs: u64) -> (BreakerRegistry, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        let config = BreakerConfig {
            failure_threshold: threshold,
            cooldown: Duration::from_secs(cooldown_secs),
        };
        (BreakerRegistry::new(config, clock.clone()), clock)
    }

    #[test]
    fn test_opens_after_threshold() {
        let (reg, _clock) = registry(3, 30);

        for _ in 0..2 {
            assert_eq!(reg.admit("k").unwrap(), Admission::Normal);
            reg.record_failure("k", Admission::Normal, true);
        }
        assert_eq!(reg.get("k").unwrap().state, CircuitState::Closed);

        reg.admit("k").unwrap();
        reg.record_failure("k", Admission::Normal, true);
        assert_eq!(reg.get("k").unwrap().state, CircuitState::Open);
        assert!(reg.admit("k").unwrap_err().is_circuit_open());
    }

    #[test]
    fn test_terminal_failures_do_not_count() {
        let (reg, _clock) = registry(1, 30);
        reg.admit("k").unwrap();
        reg.record_failure("k", Admission::Normal, false);
        assert_eq!(reg.get("k").unwrap().failure_count, 0);
        assert_eq!(reg.admit("k").unwrap(), Admission::Normal);
    }

    #[test]
    fn test_half_open_after_cooldown_admits_one_trial() {
        let (reg, clock) = registry(1, 30);
        reg.admit("k").unwrap();
        reg.record_failure("k", Admission::Normal, true);

        clock.advance(Duration::from_secs(10));
        match reg.admit("k") {
            Err(FetchError::CircuitOpen { retry_in, .. }) => {
                assert_eq!(retry_in, Duration::from_secs(20));
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }

        clock.advance(Duration::from_secs(20));
        assert_eq!(reg.admit("k").unwrap(), Admission::Trial);
        assert!(reg.admit("k").unwrap_err().is_circuit_open());

        reg.record_success("k");
        let state = reg.get("k").unwrap();
        assert_eq!(state.state, CircuitState::Closed);
        assert_eq!(state.failure_count, 0);
    }

    #[test]
    fn test_failed_trial_reopens() {
        let (reg, clock) = registry(1, 30);
        reg.admit("k").unwrap();
        reg.record_failure("k", Admission::Normal, true);
        clock.advance(Duration::from_secs(30));

        assert_eq!(reg.admit("k").unwrap(), Admission::Trial);
        reg.record_failure("k", Admission::Trial, true);

        let state = reg.get("k").unwrap();
        assert_eq!(state.state, CircuitState::Open);
        assert!(!state.trial_in_flight);
        assert!(reg.admit("k").unwrap_err().is_circuit_open());
    }

    #[test]
    fn test_abandoned_trial_reopens_with_fresh_cooldown() {
        let (reg, clock) = registry(1, 30);
        reg.admit("k").unwrap();
        reg.record_failure("k", Admission::Normal, true);
        clock.advance(Duration::from_secs(30));
        assert_eq!(reg.admit("k").unwrap(), Admission::Trial);

        clock.advance(Duration::from_secs(5));
        reg.abandon_trial("k");

        let state = reg.get("k").unwrap();
        assert_eq!(state.state, CircuitState::Open);
        assert!(!state.trial_in_flight);
        match reg.admit("k") {
            Err(FetchError::CircuitOpen { retry_in, .. }) => {
                assert_eq!(retry_in, Duration::from_secs(30));
            }
            other => panic!("expected CircuitOpen, got {other:?}"),
        }

        clock.advance(Duration::from_secs(30));
        assert_eq!(reg.admit("k").unwrap(), Admission::Trial);
    }

    #[test]
    fn test_abandon_ignores_settled_breakers() {
        let (reg, _clock) = registry(1, 30);
        reg.admit("k").unwrap();
        reg.abandon_trial("k");
        reg.abandon_trial("missing");

        assert_eq!(reg.get("k").unwrap().state, CircuitState::Closed);
        assert!(reg.get("missing").is_none());
    }

    #[test]
    fn test_keys_are_independent() {
        let (reg, _clock) = registry(1, 30);
        reg.admit("a").unwrap();
        reg.record_failure("a", Admission::Normal, true);

        assert!(reg.admit("a").is_err());
        assert_eq!(reg.admit("b").unwrap(), Admission::Normal);
    }

    #[test]
    fn test_success_resets_count() {
        let (reg, _clock) = registry(3, 30);
        reg.record_failure("k", Admission::Normal, true);
        reg.record_failure("k", Admission::Normal, true);
        reg.record_success("k");
        reg.record_failure("k", Admission::Normal, true);
        assert_eq!(reg.get("k").unwrap().failure_count, 1);
        assert_eq!(reg.get("k").unwrap().state, CircuitState::Closed);
    }
}
