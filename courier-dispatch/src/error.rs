//! Typed error handling for dispatch operations.
//!
//! Backends fail with a [`BackendError`]; everything the orchestrator can
//! short-circuit or give up on is a [`DispatchError`]. Neither ever escapes
//! `submit` as an `Err`: each is folded into the returned status record.

use courier_common::BackendId;
use thiserror::Error;

/// Failure reported by a single call into a delivery backend.
///
/// All variants are treated as transient by the retry executor.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// The backend could not be reached or is not accepting work.
    #[error("{0} unavailable")]
    Unavailable(String),

    /// The backend refused this particular message.
    #[error("{0} rejected the message")]
    Rejected(String),

    /// The backend did not answer in time.
    #[error("{0} timed out")]
    Timeout(String),
}

/// Reasons a submission did not end in a delivery.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The message was already delivered, or is being delivered right now.
    #[error("duplicate")]
    Duplicate,

    /// The circuit breaker is inside its cooldown window.
    #[error("circuit open")]
    CircuitOpen,

    /// No admission token was available.
    #[error("rate limit exceeded")]
    RateLimitExceeded,

    /// A backend failed on every attempt the retry policy allowed.
    #[error("backend {backend} failed: {source}")]
    Backend {
        backend: BackendId,
        #[source]
        source: BackendError,
    },

    /// Every registered backend was exhausted.
    #[error("all providers failed")]
    AllBackendsExhausted,
}

impl DispatchError {
    /// The reason string recorded in the status log for this error.
    #[must_use]
    pub fn reason(&self) -> String {
        match self {
            Self::Backend { source, .. } => source.to_string(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reason_strings() {
        assert_eq!(DispatchError::Duplicate.reason(), "duplicate");
        assert_eq!(DispatchError::CircuitOpen.reason(), "circuit open");
        assert_eq!(
            DispatchError::RateLimitExceeded.reason(),
            "rate limit exceeded"
        );
        assert_eq!(
            DispatchError::AllBackendsExhausted.reason(),
            "all providers failed"
        );
    }

    #[test]
    fn test_backend_reason_is_the_source() {
        let error = DispatchError::Backend {
            backend: BackendId::from("A"),
            source: BackendError::Unavailable("ProviderA".to_string()),
        };

        assert_eq!(error.reason(), "ProviderA unavailable");
        assert_eq!(error.to_string(), "backend A failed: ProviderA unavailable");
    }
}
