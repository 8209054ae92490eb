// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Circuit breaker guarding every storage call.
//!
//! ```text
//!            failures >= threshold
//!   CLOSED ─────────────────────────▶ OPEN
//!     ▲                                 │ open_duration elapsed
//!     │ successes >= threshold          ▼ (on next state read)
//!     └──────────────────────────── HALF_OPEN ──any failure──▶ OPEN
//!
//!   FORCED_OPEN: entered via `force_open`, left only via `reset`
//! ```
//!
//! The request pipeline reads [`CircuitBreaker::state`] to decide whether to
//! short-circuit with 503. Storage calls use [`CircuitBreaker::try_acquire`]
//! and report their outcome back.

use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
    ForcedOpen,
}

impl BreakerState {
    /// Whether calls are refused in this state.
    pub fn rejects_calls(self) -> bool {
        matches!(self, BreakerState::Open | BreakerState::ForcedOpen)
    }
}

impl std::fmt::Display for BreakerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BreakerState::Closed => write!(f, "CLOSED"),
            BreakerState::Open => write!(f, "OPEN"),
            BreakerState::HalfOpen => write!(f, "HALF_OPEN"),
            BreakerState::ForcedOpen => write!(f, "FORCED_OPEN"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    pub failure_threshold: u32,
    pub success_threshold: u32,
    pub open_duration: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            open_duration: Duration::from_secs(30),
        }
    }
}

/// The breaker's lock was poisoned by a panicking holder.
#[derive(Debug, thiserror::Error)]
#[error("circuit breaker state is unreadable")]
pub struct BreakerUnavailable;

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    consecutive_failures: u32,
    half_open_successes: u32,
    opened_at: Option<Instant>,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                consecutive_failures: 0,
                half_open_successes: 0,
                opened_at: None,
            }),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Inner>, BreakerUnavailable> {
        self.inner.lock().map_err(|_| BreakerUnavailable)
    }

    /// Current state, promoting OPEN to HALF_OPEN once the wait has elapsed.
    pub fn state(&self) -> Result<BreakerState, BreakerUnavailable> {
        let mut inner = self.lock()?;
        self.promote_if_due(&mut inner);
        Ok(inner.state)
    }

    /// Whether a storage call may proceed.
    ///
    /// An unreadable breaker lets the call through.
    pub fn try_acquire(&self) -> bool {
        match self.state() {
            Ok(state) => !state.rejects_calls(),
            Err(_) => true,
        }
    }

    pub fn record_success(&self) {
        let Ok(mut inner) = self.lock() else { return };
        match inner.state {
            BreakerState::Closed => inner.consecutive_failures = 0,
            BreakerState::HalfOpen => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = BreakerState::Closed;
                    inner.consecutive_failures = 0;
                    inner.half_open_successes = 0;
                    inner.opened_at = None;
                    tracing::info!("Storage circuit breaker transitioned to CLOSED");
                }
            }
            BreakerState::Open | BreakerState::ForcedOpen => {}
        }
    }

    pub fn record_failure(&self) {
        let Ok(mut inner) = self.lock() else { return };
        match inner.state {
            BreakerState::Closed => {
                inner.consecutive_failures += 1;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    inner.state = BreakerState::Open;
                    inner.opened_at = Some(Instant::now());
                    tracing::warn!(
                        failures = inner.consecutive_failures,
                        "Storage circuit breaker transitioned to OPEN"
                    );
                }
            }
            BreakerState::HalfOpen => {
                inner.state = BreakerState::Open;
                inner.half_open_successes = 0;
                inner.opened_at = Some(Instant::now());
                tracing::warn!("Storage circuit breaker transitioned back to OPEN from HALF_OPEN");
            }
            BreakerState::Open | BreakerState::ForcedOpen => {}
        }
    }

    /// Hold the breaker open until [`reset`](Self::reset) is called.
    pub fn force_open(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.state = BreakerState::ForcedOpen;
            inner.opened_at = Some(Instant::now());
            tracing::warn!("Storage circuit breaker FORCED_OPEN");
        }
    }

    /// Return to CLOSED with cleared counters.
    pub fn reset(&self) {
        if let Ok(mut inner) = self.lock() {
            inner.state = BreakerState::Closed;
            inner.consecutive_failures = 0;
            inner.half_open_successes = 0;
            inner.opened_at = None;
            tracing::info!("Storage circuit breaker reset to CLOSED");
        }
    }

    fn promote_if_due(&self, inner: &mut Inner) {
        if inner.state != BreakerState::Open {
            return;
        }
        let due = inner
            .opened_at
            .map(|at| at.elapsed() >= self.config.open_duration)
            .unwrap_or(true);
        if due {
            inner.state = BreakerState::HalfOpen;
            inner.half_open_successes = 0;
            tracing::info!("Storage circuit breaker transitioned to HALF_OPEN");
        }
    }

    /// Poison the internal lock so state reads fail.
    #[cfg(test)]
    pub(crate) fn poison(&self) {
        let _ = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = self.inner.lock();
            panic!("poisoning breaker for test");
        }));
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn breaker(open_duration: Duration) -> CircuitBreaker {
        CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            success_threshold: 2,
            open_duration,
        })
    }

    #[test]
    fn opens_after_consecutive_failures() {
        let cb = breaker(Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state().unwrap(), BreakerState::Closed);

        cb.record_failure();
        assert_eq!(cb.state().unwrap(), BreakerState::Open);
        assert!(!cb.try_acquire());
    }

    #[test]
    fn success_resets_failure_streak() {
        let cb = breaker(Duration::from_secs(60));
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state().unwrap(), BreakerState::Closed);
    }

    #[test]
    fn half_open_after_wait_then_closes_on_successes() {
        let cb = breaker(Duration::ZERO);
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state().unwrap(), BreakerState::HalfOpen);
        assert!(cb.try_acquire());

        cb.record_success();
        assert_eq!(cb.state().unwrap(), BreakerState::HalfOpen);
        cb.record_success();
        assert_eq!(cb.state().unwrap(), BreakerState::Closed);
    }

    #[test]
    fn half_open_failure_reopens() {
        let cb = breaker(Duration::from_millis(0));
        for _ in 0..3 {
            cb.record_failure();
        }
        assert_eq!(cb.state().unwrap(), BreakerState::HalfOpen);

        cb.record_failure();
        let inner = cb.inner.lock().unwrap();
        assert_eq!(inner.state, BreakerState::Open);
    }

    #[test]
    fn forced_open_ignores_time_and_successes() {
        let cb = breaker(Duration::ZERO);
        cb.force_open();
        cb.record_success();
        assert_eq!(cb.state().unwrap(), BreakerState::ForcedOpen);
        assert!(!cb.try_acquire());

        cb.reset();
        assert_eq!(cb.state().unwrap(), BreakerState::Closed);
    }

    #[test]
    fn poisoned_breaker_reports_error_but_allows_calls() {
        let cb = breaker(Duration::from_secs(1));
        cb.poison();
        assert!(cb.state().is_err());
        assert!(cb.try_acquire());
    }
}
