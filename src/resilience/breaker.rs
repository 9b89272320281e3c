//! Count-based circuit breaker.
//!
//! ```text
//!             failure rate >= threshold
//!   Closed ─────────────────────────────▶ Open
//!     ▲                                    │
//!     │ trial success        open_duration │ elapsed
//!     │                                    ▼
//!     └──────────────────────────────── HalfOpen
//!                trial failure ──▶ Open
//! ```
//!
//! In `Closed` the outcome of every call lands in a sliding window of the
//! last `sliding_window_size` calls. Once the window holds at least
//! `minimum_calls` outcomes and the failure percentage reaches the
//! threshold, the breaker opens and rejects calls until `open_duration` has
//! passed. It then admits at most `half_open_max_calls` concurrent trial
//! calls. The first trial outcome decides: success closes the breaker with
//! an empty window, failure opens it again.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use crate::config::CircuitBreakerConfig;

use super::Clock;

#[derive(Debug, Clone)]
pub struct BreakerPolicy {
    /// Percentage in `(0, 100]`.
    pub failure_rate_threshold: f64,
    pub sliding_window_size: usize,
    pub minimum_calls: usize,
    pub open_duration: Duration,
    pub half_open_max_calls: usize,
}

impl From<&CircuitBreakerConfig> for BreakerPolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            failure_rate_threshold: config.failure_rate_threshold,
            sliding_window_size: config.sliding_window_size,
            minimum_calls: config.minimum_calls,
            open_duration: Duration::from_secs(config.open_duration_secs),
            half_open_max_calls: config.half_open_max_calls,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug)]
struct Inner {
    state: BreakerState,
    /// `true` = success, newest at the back.
    window: VecDeque<bool>,
    opened_at: Option<Instant>,
    trials_in_flight: usize,
    /// Bumped on every trip. Permits from an older generation are ignored.
    generation: u64,
}

pub struct CircuitBreaker {
    name: String,
    policy: BreakerPolicy,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, policy: BreakerPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            name: name.into(),
            policy,
            clock,
            inner: Mutex::new(Inner {
                state: BreakerState::Closed,
                window: VecDeque::new(),
                opened_at: None,
                trials_in_flight: 0,
                generation: 0,
            }),
        }
    }

    /// Current state, applying the `Open → HalfOpen` transition if the
    /// cool-down has elapsed.
    pub fn state(&self) -> BreakerState {
        let mut inner = self.lock();
        self.refresh(&mut inner);
        inner.state
    }

    /// Asks permission for one call. `None` means the call must not reach
    /// the upstream.
    ///
    /// The returned [`Permit`] must be resolved with [`Permit::success`] or
    /// [`Permit::failure`]. Dropping it unresolved (a cancelled request)
    /// frees its trial slot without counting as an outcome.
    pub fn try_acquire(&self) -> Option<Permit<'_>> {
        let mut inner = self.lock();
        self.refresh(&mut inner);

        match inner.state {
            BreakerState::Closed => Some(Permit::new(self, inner.generation, false)),
            BreakerState::Open => None,
            BreakerState::HalfOpen => {
                if inner.trials_in_flight < self.policy.half_open_max_calls {
                    inner.trials_in_flight += 1;
                    Some(Permit::new(self, inner.generation, true))
                } else {
                    None
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn refresh(&self, inner: &mut Inner) {
        if inner.state != BreakerState::Open {
            return;
        }
        let elapsed = inner
            .opened_at
            .map(|at| self.clock.now().saturating_duration_since(at))
            .unwrap_or_default();
        if elapsed >= self.policy.open_duration {
            inner.state = BreakerState::HalfOpen;
            inner.trials_in_flight = 0;
            tracing::info!(breaker = %self.name, "circuit breaker half-open");
        }
    }

    fn on_outcome(&self, generation: u64, trial: bool, success: bool) {
        let mut inner = self.lock();
        if inner.generation != generation {
            tracing::debug!(breaker = %self.name, "ignoring outcome from an earlier generation");
            return;
        }

        match inner.state {
            BreakerState::HalfOpen if trial => {
                if success {
                    inner.state = BreakerState::Closed;
                    inner.window.clear();
                    inner.opened_at = None;
                    inner.trials_in_flight = 0;
                    tracing::info!(breaker = %self.name, "circuit breaker closed");
                } else {
                    self.trip(&mut inner);
                }
            }
            BreakerState::Closed => {
                inner.window.push_back(success);
                while inner.window.len() > self.policy.sliding_window_size {
                    inner.window.pop_front();
                }
                if inner.window.len() >= self.policy.minimum_calls
                    && failure_rate(&inner.window) >= self.policy.failure_rate_threshold
                {
                    self.trip(&mut inner);
                }
            }
            // Late outcomes of calls admitted under an earlier state.
            _ => {}
        }
    }

    fn trip(&self, inner: &mut Inner) {
        inner.state = BreakerState::Open;
        inner.generation += 1;
        inner.opened_at = Some(self.clock.now());
        inner.window.clear();
        inner.trials_in_flight = 0;
        tracing::warn!(
            breaker = %self.name,
            open_for_secs = self.policy.open_duration.as_secs(),
            "circuit breaker opened"
        );
    }

    fn release_trial(&self, generation: u64) {
        let mut inner = self.lock();
        if inner.generation == generation
            && inner.state == BreakerState::HalfOpen
            && inner.trials_in_flight > 0
        {
            inner.trials_in_flight -= 1;
        }
    }
}

fn failure_rate(window: &VecDeque<bool>) -> f64 {
    if window.is_empty() {
        return 0.0;
    }
    let failures = window.iter().filter(|ok| !**ok).count();
    failures as f64 * 100.0 / window.len() as f64
}

/// Permission for a single upstream call, see [`CircuitBreaker::try_acquire`].
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    trial: bool,
    resolved: bool,
}

impl<'a> Permit<'a> {
    fn new(breaker: &'a CircuitBreaker, generation: u64, trial: bool) -> Self {
        Self {
            breaker,
            generation,
            trial,
            resolved: false,
        }
    }

    pub fn success(mut self) {
        self.resolved = true;
        self.breaker.on_outcome(self.generation, self.trial, true);
    }

    pub fn failure(mut self) {
        self.resolved = true;
        self.breaker.on_outcome(self.generation, self.trial, false);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.resolved && self.trial {
            self.breaker.release_trial(self.generation);
        }
    }
}
