//! Delivery backends
//!
//! A backend is anything that can attempt to hand a message to the outside
//! world. The orchestrator holds them in a fixed priority order and fails
//! over from one to the next; the transport itself is the backend's business.

mod flaky;

use async_trait::async_trait;
use courier_common::{BackendId, Message};
use serde::{Deserialize, Serialize};

pub use flaky::{BackendConfig, FlakyBackend};
pub use test::TestBackend;

use crate::error::BackendError;

/// Proof of a delivery, naming the backend that made it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delivery {
    pub backend: BackendId,
}

/// The delivery capability
#[async_trait]
pub trait Backend: Send + Sync + std::fmt::Debug {
    /// The name this backend is registered and reported under
    fn id(&self) -> &BackendId;

    /// Attempt a single delivery
    ///
    /// # Errors
    ///
    /// Any failure; the caller decides whether to retry.
    async fn deliver(&self, message: &Message) -> Result<Delivery, BackendError>;
}
