//! Bounded retries with exponential backoff around a single backend

use courier_common::{Message, dispatch, tracing};
use courier_tracing::traced;

use crate::{
    backend::{Backend, Delivery},
    delay::Delay,
    error::BackendError,
    policy::RetryPolicy,
};

/// Applies a [`RetryPolicy`] to calls into one backend
///
/// Every failure but the last is absorbed: the executor backs off through the
/// [`Delay`] (yielding to other submissions) and tries again. The final
/// failure is returned to the caller untouched.
pub struct RetryExecutor<'a> {
    policy: &'a RetryPolicy,
    delay: &'a dyn Delay,
}

impl<'a> RetryExecutor<'a> {
    #[must_use]
    pub const fn new(policy: &'a RetryPolicy, delay: &'a dyn Delay) -> Self {
        Self { policy, delay }
    }

    /// Deliver through `backend`, retrying up to the policy's attempt bound
    ///
    /// # Errors
    ///
    /// The error from the final attempt, once every attempt has failed.
    #[traced(instrument(level = tracing::Level::DEBUG, skip_all, fields(backend = %backend.id())), timing(precision = "ms"))]
    pub async fn execute(
        &self,
        backend: &dyn Backend,
        message: &Message,
    ) -> Result<Delivery, BackendError> {
        let mut attempt = 1;

        loop {
            let result = backend.deliver(message).await;

            if let Some(metrics) = courier_metrics::try_metrics() {
                metrics
                    .dispatch
                    .record_attempt(backend.id(), result.is_ok());
            }

            let error = match result {
                Ok(delivery) => return Ok(delivery),
                Err(error) if self.policy.is_final_attempt(attempt) => return Err(error),
                Err(error) => error,
            };

            let backoff = self.policy.backoff_after(attempt);
            dispatch!(
                level = DEBUG,
                backend = %backend.id(),
                attempt = attempt,
                backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                error = %error,
                "Delivery attempt failed, backing off"
            );

            if let Some(metrics) = courier_metrics::try_metrics() {
                metrics
                    .dispatch
                    .record_retry(backend.id(), backoff.as_secs_f64());
            }

            self.delay.sleep(backoff).await;
            attempt += 1;
        }
    }
}
