//! The dispatch orchestrator
//!
//! Every submission walks the same stages, each of which can end it:
//!
//! 1. **Dedup**: an already delivered (or in-flight) message is skipped
//! 2. **Circuit**: an open breaker fails the submission outright
//! 3. **Admission**: an empty token bucket rate-limits it
//! 4. **Failover**: backends are tried in priority order, each through the
//!    retry executor; the first delivery wins
//! 5. **Exhaustion**: no backend delivered, the submission fails
//!
//! Within a backend, failures are retried. Across backends, failures fail
//! over. Only exhausting every backend fails the submission, and even that is
//! reported as a [`StatusRecord`] rather than an error.

use std::{fmt, sync::Arc, time::Instant};

use courier_common::{BackendId, Message, dispatch, internal, tracing};
use courier_tracing::traced;

use crate::{
    backend::Backend,
    circuit_breaker::{CircuitBreaker, CircuitBreakerStats},
    config::DispatchConfig,
    dedup::{FieldKeyDeriver, KeyDeriver, SentSet},
    delay::{Delay, TokioDelay},
    error::DispatchError,
    executor::RetryExecutor,
    rate_limiter::{RateLimitStats, RateLimiter},
    status::{StatusLog, StatusRecord},
};

/// Resilient dispatch over an ordered list of backends
///
/// Safe to share between any number of concurrent submissions (wrap it in an
/// `Arc`); the limiter, breaker, sent set and status log each guard their own
/// state.
pub struct DispatchOrchestrator {
    config: DispatchConfig,
    backends: Vec<Arc<dyn Backend>>,
    key_deriver: Box<dyn KeyDeriver>,
    delay: Arc<dyn Delay>,
    sent: SentSet,
    rate_limiter: RateLimiter,
    circuit_breaker: CircuitBreaker,
    status_log: StatusLog,
}

impl fmt::Debug for DispatchOrchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchOrchestrator")
            .field("config", &self.config)
            .field("backends", &self.backends)
            .field("delay", &self.delay)
            .field("sent", &self.sent.len())
            .field("status_log", &self.status_log.len())
            .finish_non_exhaustive()
    }
}

impl DispatchOrchestrator {
    /// Orchestrator with the default key deriver and the tokio timer
    #[must_use]
    pub fn new(config: DispatchConfig, backends: Vec<Arc<dyn Backend>>) -> Self {
        let mut builder = Self::builder(config);
        builder.backends = backends;
        builder.build()
    }

    #[must_use]
    pub fn builder(config: DispatchConfig) -> DispatchOrchestratorBuilder {
        DispatchOrchestratorBuilder {
            config,
            backends: Vec::new(),
            key_deriver: None,
            delay: None,
        }
    }

    /// Dispatch a message, returning what happened to it
    ///
    /// Never fails: duplicates, an open circuit, rate limiting and backend
    /// exhaustion all come back as the record's [`Outcome`](crate::Outcome).
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all, fields(to = %message.to)), timing(precision = "ms"))]
    pub async fn submit(&self, message: Message) -> StatusRecord {
        let started = Instant::now();
        let record = self.dispatch(Arc::new(message)).await;

        if let Some(metrics) = courier_metrics::try_metrics() {
            metrics
                .dispatch
                .record_submission(record.outcome.as_str(), started.elapsed().as_secs_f64());
        }

        record
    }

    async fn dispatch(&self, message: Arc<Message>) -> StatusRecord {
        let key = self.key_deriver.derive(&message);

        let Some(reservation) = self.sent.reserve(key) else {
            internal!(level = DEBUG, to = %message.to, "Duplicate submission skipped");
            return StatusRecord::from_error(message, &DispatchError::Duplicate);
        };

        if self.circuit_breaker.is_open() {
            internal!(level = INFO, key = %reservation.key(), "Circuit open, submission rejected");
            return self.reject(message, &DispatchError::CircuitOpen);
        }

        if let Err(error) = self.rate_limiter.try_acquire() {
            return self.reject(message, &error);
        }

        let executor = RetryExecutor::new(&self.config.retry, self.delay.as_ref());

        for backend in &self.backends {
            match executor.execute(backend.as_ref(), &message).await {
                Ok(delivery) => {
                    dispatch!(
                        level = INFO,
                        backend = %delivery.backend,
                        key = %reservation.key(),
                        "Message delivered"
                    );
                    reservation.commit();
                    self.circuit_breaker.record_success();
                    return self.record(StatusRecord::delivered(message, delivery.backend));
                }
                Err(source) => {
                    let error = DispatchError::Backend {
                        backend: backend.id().clone(),
                        source,
                    };
                    tracing::warn!(
                        backend = %backend.id(),
                        error = %error,
                        "Backend exhausted its retries, failing over"
                    );
                    self.record(StatusRecord::from_error(Arc::clone(&message), &error));

                    let tripped = self.circuit_breaker.record_failure();
                    if let Some(metrics) = courier_metrics::try_metrics() {
                        metrics.dispatch.record_failover(backend.id());
                        if tripped {
                            metrics.dispatch.record_circuit_opened();
                        }
                    }
                }
            }
        }

        self.reject(message, &DispatchError::AllBackendsExhausted)
    }

    fn record(&self, record: StatusRecord) -> StatusRecord {
        self.status_log.append(record.clone());
        record
    }

    fn reject(&self, message: Arc<Message>, error: &DispatchError) -> StatusRecord {
        self.record(StatusRecord::from_error(message, error))
    }

    /// Every record so far, oldest first
    ///
    /// This is a copy; appending to it does not affect the orchestrator.
    pub fn status_log(&self) -> Vec<StatusRecord> {
        self.status_log.snapshot()
    }

    /// Registered backends, in priority order
    pub fn backend_ids(&self) -> impl Iterator<Item = &BackendId> {
        self.backends.iter().map(|backend| backend.id())
    }

    #[must_use]
    pub const fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn stats(&self) -> DispatchStats {
        DispatchStats {
            delivered: self.sent.len(),
            rate_limit: self.rate_limiter.stats(),
            circuit_breaker: self.circuit_breaker.stats(),
            status_records: self.status_log.len(),
        }
    }
}

/// Point-in-time view of the orchestrator's shared state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchStats {
    /// Distinct messages delivered
    pub delivered: usize,
    pub rate_limit: RateLimitStats,
    pub circuit_breaker: CircuitBreakerStats,
    pub status_records: usize,
}

/// Builder for [`DispatchOrchestrator`]
pub struct DispatchOrchestratorBuilder {
    config: DispatchConfig,
    backends: Vec<Arc<dyn Backend>>,
    key_deriver: Option<Box<dyn KeyDeriver>>,
    delay: Option<Arc<dyn Delay>>,
}

impl DispatchOrchestratorBuilder {
    /// Register the next backend in priority order
    #[must_use]
    pub fn backend<B: Backend + 'static>(mut self, backend: Arc<B>) -> Self {
        self.backends.push(backend);
        self
    }

    /// Replace the default `to-subject-body` key derivation
    #[must_use]
    pub fn key_deriver(mut self, key_deriver: impl KeyDeriver + 'static) -> Self {
        self.key_deriver = Some(Box::new(key_deriver));
        self
    }

    /// Replace the tokio timer used for backoff
    #[must_use]
    pub fn delay<D: Delay + 'static>(mut self, delay: Arc<D>) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub fn build(self) -> DispatchOrchestrator {
        internal!(
            level = DEBUG,
            backends = self.backends.len(),
            "Building dispatch orchestrator"
        );

        DispatchOrchestrator {
            rate_limiter: RateLimiter::new(&self.config.rate_limit),
            circuit_breaker: CircuitBreaker::new(&self.config.circuit_breaker),
            config: self.config,
            backends: self.backends,
            key_deriver: self.key_deriver.unwrap_or_else(|| Box::new(FieldKeyDeriver)),
            delay: self.delay.unwrap_or_else(|| Arc::new(TokioDelay)),
            sent: SentSet::new(),
            status_log: StatusLog::default(),
        }
    }
}
