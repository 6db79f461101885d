use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::BusError;

use super::traits::{BusChannel, BusConnector};

/// A long-lived consumer that owns one bus connection at a time.
///
/// `run` is expected to declare its topology, consume until the connection
/// breaks, and return. Returning `Ok(())` is treated the same as an error: the
/// supervisor backs off and reconnects.
#[async_trait]
pub trait BusWorker: Send + Sync {
    fn name(&self) -> &str;
    async fn run(&self, channel: Arc<dyn BusChannel>) -> Result<(), BusError>;
}

/// Connect and failure counts, returned by [`Supervisor::run`] once it stops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SupervisorStats {
    pub connects: u64,
    pub failures: u64,
}

/// Keeps a [`BusWorker`] connected forever with a fixed backoff between
/// attempts. Never gives up; only a shutdown signal ends the loop.
pub struct Supervisor {
    connector: Arc<dyn BusConnector>,
    backoff: Duration,
}

impl Supervisor {
    pub fn new(connector: Arc<dyn BusConnector>, backoff: Duration) -> Self {
        Self { connector, backoff }
    }

    pub async fn run(
        &self,
        worker: Arc<dyn BusWorker>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> SupervisorStats {
        let mut stats = SupervisorStats::default();
        loop {
            let outcome = tokio::select! {
                _ = shutdown.recv() => break,
                outcome = self.run_once(worker.as_ref(), &mut stats) => outcome,
            };

            stats.failures += 1;
            match outcome {
                Ok(()) => tracing::warn!(
                    worker = worker.name(),
                    transport = self.connector.name(),
                    "bus consumer stopped; reconnecting"
                ),
                Err(e) => tracing::warn!(
                    worker = worker.name(),
                    transport = self.connector.name(),
                    error = %e,
                    "bus not ready/disconnected"
                ),
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.backoff) => {}
            }
        }
        tracing::info!(
            worker = worker.name(),
            connects = stats.connects,
            failures = stats.failures,
            "bus supervisor stopped"
        );
        stats
    }

    async fn run_once(
        &self,
        worker: &dyn BusWorker,
        stats: &mut SupervisorStats,
    ) -> Result<(), BusError> {
        let channel = self.connector.connect().await?;
        stats.connects += 1;
        tracing::info!(
            worker = worker.name(),
            transport = self.connector.name(),
            "bus connected"
        );
        worker.run(channel).await
    }
}
