//! Outcome records and the append-only status log

use std::{fmt, sync::Arc};

use chrono::{DateTime, Utc};
use courier_common::{BackendId, Message};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::DispatchError;

/// What happened to a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// Already delivered; nothing was attempted
    Skipped,
    RateLimited,
    Failed,
    /// One backend was exhausted and the next one is being tried.
    ///
    /// Only ever appears in the status log, never as the result of a submission.
    Failover,
}

impl Outcome {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Skipped => "skipped",
            Self::RateLimited => "rate_limited",
            Self::Failed => "failed",
            Self::Failover => "failover",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the status log, and the result of a submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub message: Arc<Message>,
    pub outcome: Outcome,
    pub reason: Option<String>,
    pub backend: Option<BackendId>,
    pub recorded_at: DateTime<Utc>,
}

impl StatusRecord {
    #[must_use]
    pub fn delivered(message: Arc<Message>, backend: BackendId) -> Self {
        Self {
            message,
            outcome: Outcome::Success,
            reason: None,
            backend: Some(backend),
            recorded_at: Utc::now(),
        }
    }

    /// The record describing `error` for `message`
    #[must_use]
    pub fn from_error(message: Arc<Message>, error: &DispatchError) -> Self {
        let (outcome, backend) = match error {
            DispatchError::Duplicate => (Outcome::Skipped, None),
            DispatchError::RateLimitExceeded => (Outcome::RateLimited, None),
            DispatchError::CircuitOpen | DispatchError::AllBackendsExhausted => {
                (Outcome::Failed, None)
            }
            DispatchError::Backend { backend, .. } => (Outcome::Failover, Some(backend.clone())),
        };

        Self {
            message,
            outcome,
            reason: Some(error.reason()),
            backend,
            recorded_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }
}

/// Ordered, append-only record of what the orchestrator did
#[derive(Debug, Default)]
pub struct StatusLog {
    records: RwLock<Vec<StatusRecord>>,
}

impl StatusLog {
    pub fn append(&self, record: StatusRecord) {
        self.records.write().push(record);
    }

    /// Copy of every record so far, oldest first
    pub fn snapshot(&self) -> Vec<StatusRecord> {
        self.records.read().clone()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BackendError;

    fn message() -> Arc<Message> {
        Arc::new(Message::new("user@example.com", "Subject", "Body"))
    }

    #[test]
    fn test_error_outcomes() {
        let cases = [
            (DispatchError::Duplicate, Outcome::Skipped, "duplicate"),
            (DispatchError::CircuitOpen, Outcome::Failed, "circuit open"),
            (
                DispatchError::RateLimitExceeded,
                Outcome::RateLimited,
                "rate limit exceeded",
            ),
            (
                DispatchError::AllBackendsExhausted,
                Outcome::Failed,
                "all providers failed",
            ),
        ];

        for (error, outcome, reason) in cases {
            let record = StatusRecord::from_error(message(), &error);
            assert_eq!(record.outcome, outcome);
            assert_eq!(record.reason.as_deref(), Some(reason));
            assert_eq!(record.backend, None);
        }
    }

    #[test]
    fn test_failover_record_names_the_backend() {
        let error = DispatchError::Backend {
            backend: BackendId::from("A"),
            source: BackendError::Timeout("ProviderA".to_string()),
        };

        let record = StatusRecord::from_error(message(), &error);

        assert_eq!(record.outcome, Outcome::Failover);
        assert_eq!(record.backend, Some(BackendId::from("A")));
        assert_eq!(record.reason.as_deref(), Some("ProviderA timed out"));
        assert!(!record.is_success());
    }

    #[test]
    fn test_status_log_preserves_order() {
        let log = StatusLog::default();
        assert!(log.is_empty());

        log.append(StatusRecord::from_error(
            message(),
            &DispatchError::RateLimitExceeded,
        ));
        log.append(StatusRecord::delivered(message(), BackendId::from("B")));

        let records = log.snapshot();
        assert_eq!(log.len(), 2);
        assert_eq!(records[0].outcome, Outcome::RateLimited);
        assert_eq!(records[1].outcome, Outcome::Success);
        assert!(records[1].is_success());
    }

    #[test]
    fn test_outcome_serializes_snake_case() {
        assert_eq!(Outcome::RateLimited.to_string(), "rate_limited");
        assert_eq!(
            ron::to_string(&Outcome::RateLimited).ok().as_deref(),
            Some("rate_limited")
        );
    }
}
