//! Retry policy for a single backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Retry policy applied to each backend in the failover order.
///
/// Backoff is plain exponential doubling from `base_delay_ms`, without jitter
/// or a cap: the attempt bound keeps the growth small.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per backend, including the first.
    ///
    /// Default: 3 attempts. A value of 0 behaves as 1.
    #[serde(default = "defaults::max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (in milliseconds).
    ///
    /// Retry `n` waits `base * 2^(n - 1)`.
    ///
    /// Default: 500 milliseconds
    #[serde(default = "defaults::base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: defaults::max_attempts(),
            base_delay_ms: defaults::base_delay_ms(),
        }
    }
}

impl RetryPolicy {
    /// Attempts a backend actually gets, never fewer than one.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        if self.max_attempts == 0 {
            1
        } else {
            self.max_attempts
        }
    }

    /// Check if `attempt` (1-indexed) is the last one allowed.
    #[must_use]
    pub const fn is_final_attempt(&self, attempt: u32) -> bool {
        attempt >= self.attempts()
    }

    /// Backoff to wait after the given failed attempt (1-indexed).
    #[must_use]
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let millis = if exponent >= 63 {
            u64::MAX
        } else {
            self.base_delay_ms.saturating_mul(1u64 << exponent)
        };

        Duration::from_millis(millis)
    }
}

mod defaults {
    pub const fn max_attempts() -> u32 {
        3
    }

    pub const fn base_delay_ms() -> u64 {
        500
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_policy_defaults() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 500);
    }

    #[test]
    fn test_is_final_attempt() {
        let policy = RetryPolicy::default();

        assert!(!policy.is_final_attempt(1));
        assert!(!policy.is_final_attempt(2));
        assert!(policy.is_final_attempt(3));
        assert!(policy.is_final_attempt(4));
    }

    #[test]
    fn test_zero_attempts_behaves_as_one() {
        let policy = RetryPolicy {
            max_attempts: 0,
            base_delay_ms: 500,
        };

        assert_eq!(policy.attempts(), 1);
        assert!(policy.is_final_attempt(1));
    }

    #[test]
    fn test_backoff_doubles() {
        let policy = RetryPolicy::default();

        assert_eq!(policy.backoff_after(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff_after(3), Duration::from_millis(2_000));
    }

    #[test]
    fn test_backoff_saturates() {
        let policy = RetryPolicy {
            max_attempts: 100,
            base_delay_ms: 500,
        };

        assert_eq!(policy.backoff_after(80), Duration::from_millis(u64::MAX));
    }

    #[test]
    fn test_partial_config_from_ron() {
        let policy: RetryPolicy = ron::from_str("(base_delay_ms: 10)").unwrap();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay_ms, 10);
    }
}
