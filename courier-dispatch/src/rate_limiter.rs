//! Admission control using a token bucket
//!
//! Guards the total submission volume of the orchestrator. Every submission
//! that reaches admission consumes one token; once the bucket is empty,
//! submissions are rejected immediately until the bucket is refilled.
//!
//! # Refill
//!
//! Unlike a trickling bucket, refill is all-or-nothing: once more than
//! `refill_interval_ms` has elapsed since the last refill, the bucket is reset
//! to full capacity and the refill time is stamped. Between refills no tokens
//! accrue.
//!
//! ```text
//! capacity: 5, refill interval: 10s
//!
//! t=0s:   5 submissions admitted, bucket empty
//! t=3s:   rejected (no tokens, interval not elapsed)
//! t=10.1s: bucket reset to 5, submission admitted (4 left)
//! ```

use std::time::Duration;

use courier_common::internal;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::error::DispatchError;

/// Configuration for admission control
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RateLimitConfig {
    /// Maximum number of tokens in the bucket
    #[serde(default = "default_capacity")]
    pub capacity: u32,

    /// How long after the last refill the bucket is reset to capacity (milliseconds)
    #[serde(default = "default_refill_interval_ms")]
    pub refill_interval_ms: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
            refill_interval_ms: default_refill_interval_ms(),
        }
    }
}

const fn default_capacity() -> u32 {
    5
}

const fn default_refill_interval_ms() -> u64 {
    10_000
}

#[derive(Debug)]
struct TokenBucket {
    /// Always within `0..=capacity`
    tokens: u32,
    capacity: u32,
    refill_interval: Duration,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket
    const fn new(capacity: u32, refill_interval: Duration, now: Instant) -> Self {
        Self {
            tokens: capacity,
            capacity,
            refill_interval,
            last_refill: now,
        }
    }

    /// Reset to capacity if the refill interval has elapsed
    ///
    /// Returns `true` if the bucket was refilled.
    fn refill(&mut self, now: Instant) -> bool {
        if now.saturating_duration_since(self.last_refill) > self.refill_interval {
            self.tokens = self.capacity;
            self.last_refill = now;
            true
        } else {
            false
        }
    }

    /// Tokens a consume at `now` would see, without applying the refill
    fn available(&self, now: Instant) -> u32 {
        if now.saturating_duration_since(self.last_refill) > self.refill_interval {
            self.capacity
        } else {
            self.tokens
        }
    }

    fn try_consume(&mut self, now: Instant) -> bool {
        self.refill(now);

        if self.tokens > 0 {
            self.tokens -= 1;
            true
        } else {
            false
        }
    }
}

/// Token-bucket rate limiter shared by every concurrent submission
#[derive(Debug)]
pub struct RateLimiter {
    bucket: Mutex<TokenBucket>,
}

impl RateLimiter {
    /// Create a rate limiter with a full bucket
    #[must_use]
    pub fn new(config: &RateLimitConfig) -> Self {
        Self {
            bucket: Mutex::new(TokenBucket::new(
                config.capacity,
                Duration::from_millis(config.refill_interval_ms),
                Instant::now(),
            )),
        }
    }

    /// Take one token, refilling first if the interval has elapsed
    ///
    /// Never waits: an empty bucket fails straight away.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::RateLimitExceeded`] if no token is available.
    pub fn try_acquire(&self) -> Result<(), DispatchError> {
        let mut bucket = self.bucket.lock();

        if bucket.try_consume(Instant::now()) {
            Ok(())
        } else {
            let capacity = bucket.capacity;
            drop(bucket);
            internal!(
                level = DEBUG,
                capacity = capacity,
                "Rate limit exceeded, rejecting submission"
            );
            Err(DispatchError::RateLimitExceeded)
        }
    }

    /// Current bucket state, counting any refill that is due
    ///
    /// Read-only: the refill window stays anchored where `try_acquire` left it.
    pub fn stats(&self) -> RateLimitStats {
        let bucket = self.bucket.lock();

        RateLimitStats {
            available_tokens: bucket.available(Instant::now()),
            capacity: bucket.capacity,
        }
    }
}

/// Snapshot of the token bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitStats {
    pub available_tokens: u32,
    pub capacity: u32,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn bucket(capacity: u32, refill_ms: u64) -> (TokenBucket, Instant) {
        let start = Instant::now();
        (
            TokenBucket::new(capacity, Duration::from_millis(refill_ms), start),
            start,
        )
    }

    #[test]
    fn test_token_bucket_consume() {
        let (mut bucket, start) = bucket(5, 10_000);

        assert_eq!(bucket.tokens, 5);

        for remaining in (0..5).rev() {
            assert!(bucket.try_consume(start));
            assert_eq!(bucket.tokens, remaining);
        }

        assert!(!bucket.try_consume(start));
        assert_eq!(bucket.tokens, 0);
    }

    #[test]
    fn test_no_refill_before_interval() {
        let (mut bucket, start) = bucket(2, 10_000);

        assert!(bucket.try_consume(start));
        assert!(bucket.try_consume(start));

        // Exactly at the interval is not "more than" the interval
        let at_interval = start + Duration::from_millis(10_000);
        assert!(!bucket.try_consume(at_interval));
        assert_eq!(bucket.last_refill, start);
    }

    #[test]
    fn test_refill_is_a_full_reset() {
        let (mut bucket, start) = bucket(5, 10_000);

        for _ in 0..5 {
            assert!(bucket.try_consume(start));
        }

        // Long enough for several intervals to pass: still only capacity
        let later = start + Duration::from_secs(60);
        assert!(bucket.refill(later));
        assert_eq!(bucket.tokens, 5);
        assert_eq!(bucket.last_refill, later);
    }

    #[test]
    fn test_partial_bucket_refills_to_capacity() {
        let (mut bucket, start) = bucket(5, 1_000);

        assert!(bucket.try_consume(start));
        assert_eq!(bucket.tokens, 4);

        let later = start + Duration::from_millis(1_001);
        assert!(bucket.try_consume(later));
        assert_eq!(bucket.tokens, 4);
    }

    #[test]
    fn test_available_does_not_move_the_window() {
        let (mut bucket, start) = bucket(2, 1_000);

        assert!(bucket.try_consume(start));
        assert!(bucket.try_consume(start));

        let due = start + Duration::from_millis(1_500);
        assert_eq!(bucket.available(due), 2);
        assert_eq!(bucket.tokens, 0);
        assert_eq!(bucket.last_refill, start);

        assert_eq!(bucket.available(start + Duration::from_millis(1_000)), 0);
    }

    #[test]
    fn test_rate_limiter_default_limits() {
        let limiter = RateLimiter::new(&RateLimitConfig::default());

        for _ in 0..5 {
            assert!(limiter.try_acquire().is_ok());
        }

        assert!(matches!(
            limiter.try_acquire(),
            Err(DispatchError::RateLimitExceeded)
        ));
    }

    #[test]
    fn test_rate_limiter_stats() {
        let limiter = RateLimiter::new(&RateLimitConfig {
            capacity: 3,
            refill_interval_ms: 60_000,
        });

        assert_eq!(
            limiter.stats(),
            RateLimitStats {
                available_tokens: 3,
                capacity: 3
            }
        );

        limiter.try_acquire().unwrap();
        assert_eq!(limiter.stats().available_tokens, 2);
    }

    #[test]
    fn test_config_defaults_from_ron() {
        let config: RateLimitConfig = ron::from_str("(capacity: 10)").unwrap();
        assert_eq!(config.capacity, 10);
        assert_eq!(config.refill_interval_ms, 10_000);
    }
}
