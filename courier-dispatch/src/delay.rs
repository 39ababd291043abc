//! Suspension between retry attempts

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

/// Suspends the current submission without blocking other work
///
/// Implementations must yield to the runtime rather than block the thread:
/// other submissions keep running while one is backing off.
#[async_trait]
pub trait Delay: Send + Sync + std::fmt::Debug {
    async fn sleep(&self, duration: Duration);
}

/// [`Delay`] backed by the tokio timer
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioDelay;

#[async_trait]
impl Delay for TokioDelay {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// [`Delay`] that returns immediately and remembers what it was asked for
///
/// Lets tests assert on backoff without waiting for it.
#[derive(Debug, Default)]
pub struct RecordingDelay {
    requested: Mutex<Vec<Duration>>,
}

impl RecordingDelay {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every duration requested so far, in order
    pub fn requested(&self) -> Vec<Duration> {
        self.requested.lock().clone()
    }
}

#[async_trait]
impl Delay for RecordingDelay {
    async fn sleep(&self, duration: Duration) {
        self.requested.lock().push(duration);
        tokio::task::yield_now().await;
    }
}
