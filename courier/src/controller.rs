use std::sync::Arc;

use courier_common::{BackendId, Message, internal, logging, tracing};
use courier_dispatch::{
    Backend, BackendConfig, DispatchConfig, DispatchOrchestrator, FlakyBackend, StatusRecord,
};
use courier_metrics::MetricsConfig;
use courier_tracing::traced;
use futures_util::future::join_all;
use serde::Deserialize;

/// Top-level configuration, read from `courier.config.ron`
#[derive(Debug, Deserialize)]
pub struct Courier {
    #[serde(default)]
    dispatch: DispatchConfig,
    #[serde(alias = "backend", default = "default_backends")]
    backends: Vec<BackendConfig>,
    #[serde(default)]
    metrics: MetricsConfig,
    /// Messages submitted once the orchestrator is up
    #[serde(default)]
    outbox: Vec<Message>,
}

impl Default for Courier {
    fn default() -> Self {
        Self {
            dispatch: DispatchConfig::default(),
            backends: default_backends(),
            metrics: MetricsConfig::default(),
            outbox: Vec::new(),
        }
    }
}

fn default_backends() -> Vec<BackendConfig> {
    vec![
        BackendConfig {
            id: BackendId::from("A"),
            failure_rate: 0.7,
        },
        BackendConfig {
            id: BackendId::from("B"),
            failure_rate: 0.3,
        },
    ]
}

#[traced(instrument(level = tracing::Level::TRACE))]
async fn shutdown() -> anyhow::Result<()> {
    let mut terminate = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::select! {
        r = tokio::signal::ctrl_c() => {
            r?;
            internal!("CTRL+C entered, abandoning the outbox");
        }
        _ = terminate.recv() => {
            internal!("Terminate Signal received, abandoning the outbox");
        }
    };

    Ok(())
}

impl Courier {
    #[must_use]
    pub fn backends(&self) -> &[BackendConfig] {
        &self.backends
    }

    #[must_use]
    pub fn outbox(&self) -> &[Message] {
        &self.outbox
    }

    /// Build an orchestrator over the configured backends, in configured order
    #[must_use]
    pub fn orchestrator(&self) -> DispatchOrchestrator {
        let backends = self
            .backends
            .iter()
            .map(|config| Arc::new(FlakyBackend::from(config)) as Arc<dyn Backend>)
            .collect();

        DispatchOrchestrator::new(self.dispatch.clone(), backends)
    }

    /// Submit every outbox message concurrently, returning the results in
    /// outbox order
    pub async fn dispatch_outbox(&self, orchestrator: &DispatchOrchestrator) -> Vec<StatusRecord> {
        join_all(
            self.outbox
                .iter()
                .cloned()
                .map(|message| orchestrator.submit(message)),
        )
        .await
    }

    /// Run this controller: dispatch the outbox, then report what happened
    ///
    /// # Errors
    ///
    /// This function will return an error if metrics fail to initialise, or
    /// if listening for shutdown signals fails.
    #[traced(instrument(level = tracing::Level::TRACE, skip_all, err), timing(precision = "s"))]
    pub async fn run(self) -> anyhow::Result<()> {
        logging::init();
        courier_metrics::init_metrics(&self.metrics)?;

        let orchestrator = self.orchestrator();
        internal!(
            level = INFO,
            backends = ?orchestrator.backend_ids().collect::<Vec<_>>(),
            messages = self.outbox.len(),
            "Controller running"
        );

        tokio::select! {
            records = self.dispatch_outbox(&orchestrator) => {
                for record in &records {
                    internal!(
                        level = INFO,
                        to = %record.message.to,
                        outcome = %record.outcome,
                        backend = ?record.backend.as_ref().map(BackendId::as_str),
                        reason = ?record.reason,
                        "Submission finished"
                    );
                }
            }
            r = shutdown() => {
                r?;
            }
        };

        let stats = orchestrator.stats();
        internal!(
            level = INFO,
            delivered = stats.delivered,
            available_tokens = stats.rate_limit.available_tokens,
            circuit = ?stats.circuit_breaker.state,
            consecutive_failures = stats.circuit_breaker.consecutive_failures,
            records = stats.status_records,
            "Shutting down..."
        );

        Ok(())
    }
}
