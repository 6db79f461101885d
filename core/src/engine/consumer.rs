use std::sync::Arc;

use async_trait::async_trait;

use crate::bus::{
    control_exchange, events_exchange, BusChannel, BusWorker, QueueBinding, CONTROL_EXCHANGE,
    ROUTING_START,
};
use crate::error::BusError;
use crate::protocol::StartRequest;

use super::run::ScenarioEngine;

/// Consumes start requests from the durable control queue and hands each one
/// to the engine as an independent playback.
pub struct ControlConsumer {
    engine: Arc<ScenarioEngine>,
    queue: String,
}

impl ControlConsumer {
    pub fn new(engine: Arc<ScenarioEngine>, queue: impl Into<String>) -> Self {
        Self {
            engine,
            queue: queue.into(),
        }
    }
}

#[async_trait]
impl BusWorker for ControlConsumer {
    fn name(&self) -> &str {
        "control-consumer"
    }

    async fn run(&self, channel: Arc<dyn BusChannel>) -> Result<(), BusError> {
        channel.declare_exchange(&control_exchange()).await?;
        channel.declare_exchange(&events_exchange()).await?;
        let mut sub = channel
            .subscribe(&QueueBinding::durable(
                self.queue.as_str(),
                CONTROL_EXCHANGE,
                ROUTING_START,
            ))
            .await?;
        self.engine.publisher().attach(channel.clone()).await;
        tracing::info!(queue = %self.queue, "ready, waiting for control events");

        while let Some(delivery) = sub.next().await {
            let mut delivery = delivery?;
            let request = StartRequest::parse_lenient(&delivery.body);
            delivery.ack().await?;
            tracing::info!(
                scenario = %request.scenario,
                run_id = %request.run_id,
                "start request received"
            );
            self.engine.spawn(request);
        }
        Ok(())
    }
}
