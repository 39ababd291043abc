#![allow(dead_code)]

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use async_trait::async_trait;
use courier_dispatch::{
    Backend, BackendError, BackendId, Delivery, DispatchConfig, DispatchOrchestrator, Message,
    RateLimitConfig, RecordingDelay, TestBackend,
};

pub fn message(n: usize) -> Message {
    Message::new(
        format!("user{n}@example.com"),
        "Your receipt",
        format!("Order #{n}"),
    )
}

/// Orchestrator over `backends` whose backoff is recorded instead of slept
pub fn orchestrator(
    config: DispatchConfig,
    backends: &[Arc<TestBackend>],
) -> (DispatchOrchestrator, Arc<RecordingDelay>) {
    let delay = Arc::new(RecordingDelay::new());
    let builder = backends
        .iter()
        .fold(DispatchOrchestrator::builder(config), |builder, backend| {
            builder.backend(Arc::clone(backend))
        });

    (builder.delay(Arc::clone(&delay)).build(), delay)
}

/// Default config with a bucket large enough never to get in the way
pub fn unlimited() -> DispatchConfig {
    DispatchConfig {
        rate_limit: RateLimitConfig {
            capacity: 1_000,
            ..RateLimitConfig::default()
        },
        ..DispatchConfig::default()
    }
}

/// Backend that fails the first `failures` deliveries to one recipient and
/// delivers everything else
#[derive(Debug)]
pub struct RecipientBackend {
    id: BackendId,
    recipient: String,
    remaining: AtomicUsize,
    calls: AtomicUsize,
}

impl RecipientBackend {
    pub fn new(id: impl Into<BackendId>, recipient: impl Into<String>, failures: usize) -> Self {
        Self {
            id: id.into(),
            recipient: recipient.into(),
            remaining: AtomicUsize::new(failures),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Backend for RecipientBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    async fn deliver(&self, message: &Message) -> Result<Delivery, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let fail = message.to == self.recipient
            && self
                .remaining
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();

        if fail {
            return Err(BackendError::Unavailable(format!("Provider{}", self.id)));
        }

        Ok(Delivery {
            backend: self.id.clone(),
        })
    }
}
