use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{events_exchange, BusChannel, BusWorker, QueueBinding, EVENTS_EXCHANGE};
use crate::error::BusError;

use super::registry::SessionRegistry;

/// Subscribes a private queue to the event exchange and forwards every
/// message body, unparsed, to the connected viewers.
pub struct RelayConsumer {
    registry: Arc<SessionRegistry>,
}

impl RelayConsumer {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl BusWorker for RelayConsumer {
    fn name(&self) -> &str {
        "event-relay"
    }

    async fn run(&self, channel: Arc<dyn BusChannel>) -> Result<(), BusError> {
        channel.declare_exchange(&events_exchange()).await?;
        let mut sub = channel
            .subscribe(&QueueBinding::exclusive(EVENTS_EXCHANGE))
            .await?;
        tracing::info!("relay subscribed to event exchange");

        while let Some(delivery) = sub.next().await {
            let mut delivery = delivery?;
            let report = self.registry.broadcast(&delivery.text()).await;
            if report.dropped > 0 {
                tracing::info!(
                    delivered = report.delivered,
                    dropped = report.dropped,
                    "viewers dropped during broadcast"
                );
            }
            delivery.ack().await?;
        }
        Ok(())
    }
}
