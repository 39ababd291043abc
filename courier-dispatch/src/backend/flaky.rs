use async_trait::async_trait;
use courier_common::{BackendId, Message, dispatch};
use rand::Rng;
use serde::{Deserialize, Serialize};

use super::{Backend, Delivery};
use crate::error::BackendError;

/// Registration of a simulated backend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackendConfig {
    pub id: BackendId,

    /// Probability in `0.0..=1.0` that a delivery attempt fails
    #[serde(default)]
    pub failure_rate: f64,
}

/// A backend that fails at random with a fixed probability
///
/// Stands in for a real transport when exercising the dispatch layer.
#[derive(Debug, Clone)]
pub struct FlakyBackend {
    id: BackendId,
    failure_rate: f64,
}

impl FlakyBackend {
    /// Out-of-range rates are clamped; NaN is treated as always failing.
    #[must_use]
    pub fn new(id: impl Into<BackendId>, failure_rate: f64) -> Self {
        let failure_rate = if failure_rate.is_nan() {
            1.0
        } else {
            failure_rate.clamp(0.0, 1.0)
        };

        Self {
            id: id.into(),
            failure_rate,
        }
    }

    #[must_use]
    pub const fn failure_rate(&self) -> f64 {
        self.failure_rate
    }
}

impl From<&BackendConfig> for FlakyBackend {
    fn from(config: &BackendConfig) -> Self {
        Self::new(config.id.clone(), config.failure_rate)
    }
}

#[async_trait]
impl Backend for FlakyBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    async fn deliver(&self, message: &Message) -> Result<Delivery, BackendError> {
        let failed = rand::rng().random_bool(self.failure_rate);

        if failed {
            dispatch!(backend = %self.id, to = %message.to, "Simulated delivery failure");
            return Err(BackendError::Unavailable(format!("Provider{}", self.id)));
        }

        Ok(Delivery {
            backend: self.id.clone(),
        })
    }
}
