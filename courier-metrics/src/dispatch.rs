//! Dispatch orchestrator metrics
//!
//! Tracks the outcome of every submission, per-backend delivery attempts,
//! retries with their backoff, failovers and circuit breaker trips.

use std::sync::atomic::{AtomicU64, Ordering};

use opentelemetry::{
    KeyValue,
    metrics::{Counter, Histogram, Meter},
};

use crate::MetricsError;

/// Dispatch metrics collector
#[derive(Debug)]
pub struct DispatchMetrics {
    /// Submissions by terminal outcome
    submissions_total: Counter<u64>,

    /// Wall time of a whole `submit` call
    submission_duration_seconds: Histogram<f64>,

    /// Single backend calls by backend and result
    backend_attempts_total: Counter<u64>,

    /// Backends exhausted during failover
    failovers_total: Counter<u64>,

    /// Backoff delay taken before each retry
    backoff_seconds: Histogram<f64>,

    /// Times the circuit breaker opened
    circuit_opened_total: Counter<u64>,

    // Local mirrors of the counters above, readable without an exporter
    success: AtomicU64,
    skipped: AtomicU64,
    rate_limited: AtomicU64,
    failed: AtomicU64,
    failovers: AtomicU64,
    retries: AtomicU64,
    circuit_opened: AtomicU64,
}

impl DispatchMetrics {
    /// Create a new dispatch metrics collector
    ///
    /// # Errors
    ///
    /// Returns an error if metric instruments cannot be created.
    pub fn new() -> Result<Self, MetricsError> {
        let meter = meter();

        let submissions_total = meter
            .u64_counter("courier.dispatch.submissions.total")
            .with_description("Total number of submissions by outcome")
            .build();

        let submission_duration_seconds = meter
            .f64_histogram("courier.dispatch.submission.duration.seconds")
            .with_description("Distribution of submission durations")
            .build();

        let backend_attempts_total = meter
            .u64_counter("courier.dispatch.backend.attempts.total")
            .with_description("Total number of backend delivery attempts by backend and result")
            .build();

        let failovers_total = meter
            .u64_counter("courier.dispatch.failovers.total")
            .with_description("Total number of backends exhausted during failover")
            .build();

        let backoff_seconds = meter
            .f64_histogram("courier.dispatch.backoff.seconds")
            .with_description("Distribution of backoff delays before a retry")
            .build();

        let circuit_opened_total = meter
            .u64_counter("courier.dispatch.circuit.opened.total")
            .with_description("Total number of times the circuit breaker opened")
            .build();

        Ok(Self {
            submissions_total,
            submission_duration_seconds,
            backend_attempts_total,
            failovers_total,
            backoff_seconds,
            circuit_opened_total,
            success: AtomicU64::new(0),
            skipped: AtomicU64::new(0),
            rate_limited: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            failovers: AtomicU64::new(0),
            retries: AtomicU64::new(0),
            circuit_opened: AtomicU64::new(0),
        })
    }

    fn outcome_counter(&self, outcome: &str) -> Option<&AtomicU64> {
        match outcome {
            "success" => Some(&self.success),
            "skipped" => Some(&self.skipped),
            "rate_limited" => Some(&self.rate_limited),
            "failed" => Some(&self.failed),
            _ => None,
        }
    }

    /// Record the terminal outcome of a submission
    pub fn record_submission(&self, outcome: &str, duration_secs: f64) {
        let attributes = [KeyValue::new("outcome", outcome.to_string())];
        self.submissions_total.add(1, &attributes);
        self.submission_duration_seconds
            .record(duration_secs, &attributes);

        if let Some(counter) = self.outcome_counter(outcome) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a single call into a backend
    pub fn record_attempt(&self, backend: &str, delivered: bool) {
        let attributes = [
            KeyValue::new("backend", backend.to_string()),
            KeyValue::new("result", if delivered { "delivered" } else { "error" }),
        ];
        self.backend_attempts_total.add(1, &attributes);
    }

    /// Record a retry scheduled after `delay_secs` of backoff
    pub fn record_retry(&self, backend: &str, delay_secs: f64) {
        self.backoff_seconds
            .record(delay_secs, &[KeyValue::new("backend", backend.to_string())]);
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a backend that exhausted its retries
    pub fn record_failover(&self, backend: &str) {
        self.failovers_total
            .add(1, &[KeyValue::new("backend", backend.to_string())]);
        self.failovers.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the circuit breaker opening
    pub fn record_circuit_opened(&self) {
        self.circuit_opened_total.add(1, &[]);
        self.circuit_opened.fetch_add(1, Ordering::Relaxed);
    }

    /// Number of submissions that ended with `outcome`
    #[must_use]
    pub fn outcome_count(&self, outcome: &str) -> u64 {
        self.outcome_counter(outcome)
            .map_or(0, |counter| counter.load(Ordering::Relaxed))
    }

    #[must_use]
    pub fn failover_count(&self) -> u64 {
        self.failovers.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn retry_count(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn circuit_opened_count(&self) -> u64 {
        self.circuit_opened.load(Ordering::Relaxed)
    }
}

/// Get the OpenTelemetry meter for dispatch metrics
fn meter() -> Meter {
    opentelemetry::global::meter("courier.dispatch")
}
