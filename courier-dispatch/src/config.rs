//! Orchestrator configuration

use serde::{Deserialize, Serialize};

use crate::{
    circuit_breaker::CircuitBreakerConfig, policy::RetryPolicy, rate_limiter::RateLimitConfig,
};

/// Everything tunable about a [`DispatchOrchestrator`](crate::DispatchOrchestrator)
///
/// Fixed at construction; every field falls back to its default when omitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct DispatchConfig {
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    #[serde(default)]
    pub circuit_breaker: CircuitBreakerConfig,

    #[serde(default)]
    pub retry: RetryPolicy,
}
