//! Resilient dispatch of messages over interchangeable delivery backends
//!
//! This crate provides:
//! - Idempotent submission, keyed by a derived identity
//! - Token-bucket admission control
//! - Per-backend retries with exponential backoff
//! - A global circuit breaker across all backends
//! - Ordered failover between backends
//! - An append-only status log of every outcome

mod backend;
mod circuit_breaker;
mod config;
mod dedup;
mod delay;
mod error;
mod executor;
mod orchestrator;
pub mod policy;
mod rate_limiter;
mod status;

pub use backend::{Backend, BackendConfig, Delivery, FlakyBackend, TestBackend};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitBreakerStats, CircuitState};
pub use config::DispatchConfig;
// Re-export common types
pub use courier_common::{BackendId, IdentityKey, Message};
pub use dedup::{FieldKeyDeriver, KeyDeriver, Reservation, SentSet};
pub use delay::{Delay, RecordingDelay, TokioDelay};
pub use error::{BackendError, DispatchError};
pub use executor::RetryExecutor;
pub use orchestrator::{DispatchOrchestrator, DispatchOrchestratorBuilder, DispatchStats};
pub use policy::RetryPolicy;
pub use rate_limiter::{RateLimitConfig, RateLimitStats, RateLimiter};
pub use status::{Outcome, StatusLog, StatusRecord};
