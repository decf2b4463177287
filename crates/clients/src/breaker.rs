//! Circuit breaker guarding the read paths of the collaborator clients.
//!
//! A breaker watches one operation and stops calling it once it keeps
//! failing, so a struggling collaborator is not hammered with requests.
//!
//! # States
//!
//! - **Closed**: calls pass through. Consecutive failures are counted.
//! - **Open**: calls are rejected without touching the network until the
//!   cooldown elapses.
//! - **HalfOpen**: a bounded number of trial calls decide between closing
//!   again and reopening.
//!
//! Every transition starts a new generation. A call remembers the generation
//! it started in, and its result is discarded if the breaker has moved on in
//! the meantime, so a slow response from before a trip cannot close or reopen
//! the circuit.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};

/// Breaker tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,
    /// Time spent open before trial calls are let through.
    pub cooldown: Duration,
    /// Trial calls allowed while half-open. This many successes close the
    /// circuit.
    pub half_open_max_calls: u32,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cooldown: Duration::from_secs(1),
            half_open_max_calls: 1,
        }
    }
}

impl BreakerConfig {
    pub fn with_failure_threshold(mut self, threshold: u32) -> Self {
        self.failure_threshold = threshold.max(1);
        self
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn with_half_open_max_calls(mut self, calls: u32) -> Self {
        self.half_open_max_calls = calls.max(1);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Closed,
    Open,
    HalfOpen,
}

impl State {
    pub fn as_str(&self) -> &'static str {
        match self {
            State::Closed => "closed",
            State::Open => "open",
            State::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for State {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors from calls made through a breaker.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit is open; the operation was not attempted.
    #[error("circuit breaker is open")]
    Open,

    /// The circuit is half-open and every trial slot is taken.
    #[error("circuit breaker is half-open and out of trial calls")]
    TooManyTrials,

    /// The operation ran and failed.
    #[error("{0}")]
    Inner(E),
}

#[derive(Debug)]
struct Inner {
    state: State,
    generation: u64,
    /// Calls admitted in the current generation.
    requests: u32,
    consecutive_failures: u32,
    consecutive_successes: u32,
    /// When an open circuit starts letting trial calls through.
    reopen_at: Option<Instant>,
}

/// A named circuit breaker for a single operation.
///
/// The lock is only held to admit a call and to record its outcome, never
/// while the operation itself runs.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            inner: Mutex::new(Inner {
                state: State::Closed,
                generation: 0,
                requests: 0,
                consecutive_failures: 0,
                consecutive_successes: 0,
                reopen_at: None,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> BreakerConfig {
        self.config
    }

    /// Current state, moving an expired open circuit to half-open.
    pub fn state(&self) -> State {
        let mut inner = self.lock();
        self.current_state(&mut inner, Instant::now())
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Runs `operation` if the circuit admits it and records the outcome.
    ///
    /// A call that is dropped before it finishes counts as a failure.
    ///
    /// # Errors
    ///
    /// Returns `BreakerError::Open` or `BreakerError::TooManyTrials` without
    /// running the operation, or `BreakerError::Inner` when it fails.
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let generation = self.admit()?;
        let mut trial = Trial {
            breaker: self,
            generation,
            settled: false,
        };

        let outcome = operation().await;
        trial.settle(outcome.is_ok());
        outcome.map_err(BreakerError::Inner)
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn admit<E>(&self) -> Result<u64, BreakerError<E>> {
        let mut inner = self.lock();
        let now = Instant::now();

        match self.current_state(&mut inner, now) {
            State::Open => {
                counter!("circuit_breaker_rejections_total", "breaker" => self.name.clone())
                    .increment(1);
                return Err(BreakerError::Open);
            }
            State::HalfOpen if inner.requests >= self.config.half_open_max_calls => {
                counter!("circuit_breaker_rejections_total", "breaker" => self.name.clone())
                    .increment(1);
                return Err(BreakerError::TooManyTrials);
            }
            _ => {}
        }

        inner.requests = inner.requests.saturating_add(1);
        Ok(inner.generation)
    }

    fn record(&self, generation: u64, success: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        let state = self.current_state(&mut inner, now);

        if inner.generation != generation {
            return;
        }

        match (state, success) {
            (State::Closed, true) => inner.consecutive_failures = 0,
            (State::Closed, false) => {
                inner.consecutive_failures += 1;
                inner.consecutive_successes = 0;
                if inner.consecutive_failures >= self.config.failure_threshold {
                    self.transition(&mut inner, State::Open, now);
                }
            }
            (State::HalfOpen, true) => {
                inner.consecutive_successes += 1;
                if inner.consecutive_successes >= self.config.half_open_max_calls {
                    self.transition(&mut inner, State::Closed, now);
                }
            }
            (State::HalfOpen, false) => self.transition(&mut inner, State::Open, now),
            (State::Open, _) => {}
        }
    }

    fn current_state(&self, inner: &mut Inner, now: Instant) -> State {
        if inner.state == State::Open
            && let Some(reopen_at) = inner.reopen_at
            && now >= reopen_at
        {
            self.transition(inner, State::HalfOpen, now);
        }
        inner.state
    }

    fn transition(&self, inner: &mut Inner, to: State, now: Instant) {
        let from = inner.state;
        if from == to {
            return;
        }

        inner.state = to;
        inner.generation += 1;
        inner.requests = 0;
        inner.consecutive_failures = 0;
        inner.consecutive_successes = 0;
        inner.reopen_at = match to {
            State::Open => Some(now + self.config.cooldown),
            State::Closed | State::HalfOpen => None,
        };

        if to == State::Open {
            warn!(breaker = %self.name, %from, %to, "Circuit breaker state changed");
        } else {
            info!(breaker = %self.name, %from, %to, "Circuit breaker state changed");
        }
        counter!(
            "circuit_breaker_transitions_total",
            "breaker" => self.name.clone(),
            "to" => to.as_str()
        )
        .increment(1);
    }
}

/// An admitted call. Records a failure if dropped unsettled.
struct Trial<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    settled: bool,
}

impl Trial<'_> {
    fn settle(&mut self, success: bool) {
        self.settled = true;
        self.breaker.record(self.generation, success);
    }
}

impl Drop for Trial<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.record(self.generation, false);
        }
    }
}
