//! Global circuit breaker to stop hammering backends during a failure storm
//!
//! A single breaker guards every backend: each backend that exhausts its
//! retries counts as one consecutive failure, regardless of which backend it
//! was. Reaching the threshold opens the circuit for a fixed cooldown, during
//! which every submission is short-circuited.
//!
//! # States
//!
//! ```text
//! ┌─────────┐  threshold consecutive failures  ┌──────┐
//! │ Closed  │ ───────────────────────────────> │ Open │
//! └─────────┘                                   └──────┘
//!      ^                                            │
//!      └──────────── cooldown elapsed ──────────────┘
//! ```
//!
//! There is no half-open probe state. A success resets the consecutive
//! failure count but leaves an open circuit open until its cooldown runs out.
//! A failure while the circuit is open does not extend the cooldown.

use std::time::Duration;

use courier_common::internal;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Consecutive backend failures required to open the circuit
    #[serde(default = "default_failure_threshold")]
    pub failure_threshold: u32,

    /// How long the circuit stays open once tripped (milliseconds)
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: default_failure_threshold(),
            cooldown_ms: default_cooldown_ms(),
        }
    }
}

const fn default_failure_threshold() -> u32 {
    5
}

const fn default_cooldown_ms() -> u64 {
    15_000
}

/// Circuit breaker state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Submissions proceed to the backends
    Closed,
    /// Inside the cooldown window, submissions are rejected
    Open,
}

#[derive(Debug)]
struct CircuitBreakerData {
    consecutive_failures: u32,
    /// Only ever set once `consecutive_failures` reached the threshold
    opened_at: Option<Instant>,
    threshold: u32,
    cooldown: Duration,
}

impl CircuitBreakerData {
    const fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            consecutive_failures: 0,
            opened_at: None,
            threshold: config.failure_threshold,
            cooldown: Duration::from_millis(config.cooldown_ms),
        }
    }

    fn is_open(&self, now: Instant) -> bool {
        self.opened_at
            .is_some_and(|opened_at| now.saturating_duration_since(opened_at) < self.cooldown)
    }

    /// Returns `true` if this failure opened the circuit
    fn record_failure(&mut self, now: Instant) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures >= self.threshold && !self.is_open(now) {
            self.opened_at = Some(now);
            true
        } else {
            false
        }
    }

    fn record_success(&mut self) {
        self.consecutive_failures = 0;
    }

    fn state(&self, now: Instant) -> CircuitState {
        if self.is_open(now) {
            CircuitState::Open
        } else {
            CircuitState::Closed
        }
    }
}

/// Circuit breaker shared by every backend and every concurrent submission
#[derive(Debug)]
pub struct CircuitBreaker {
    data: Mutex<CircuitBreakerData>,
}

impl CircuitBreaker {
    #[must_use]
    pub fn new(config: &CircuitBreakerConfig) -> Self {
        Self {
            data: Mutex::new(CircuitBreakerData::new(config)),
        }
    }

    /// `true` while inside the cooldown window that follows a trip
    pub fn is_open(&self) -> bool {
        self.data.lock().is_open(Instant::now())
    }

    /// Record a backend that exhausted its retries
    ///
    /// Returns `true` if the circuit transitioned to Open.
    pub fn record_failure(&self) -> bool {
        let mut data = self.data.lock();
        let tripped = data.record_failure(Instant::now());

        if tripped {
            internal!(
                level = WARN,
                failure_count = data.consecutive_failures,
                threshold = data.threshold,
                cooldown_ms = u64::try_from(data.cooldown.as_millis()).unwrap_or(u64::MAX),
                "Circuit breaker OPENED - rejecting submissions until cooldown elapses"
            );
        }

        tripped
    }

    /// Record a delivery; resets the failure count without closing an open circuit
    pub fn record_success(&self) {
        self.data.lock().record_success();
    }

    pub fn state(&self) -> CircuitState {
        self.data.lock().state(Instant::now())
    }

    pub fn stats(&self) -> CircuitBreakerStats {
        let data = self.data.lock();
        CircuitBreakerStats {
            state: data.state(Instant::now()),
            consecutive_failures: data.consecutive_failures,
        }
    }
}

/// Circuit breaker statistics
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CircuitBreakerStats {
    pub state: CircuitState,
    pub consecutive_failures: u32,
}
