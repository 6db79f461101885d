//! Turns a scenario name into a published start request.
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::bus::{
    control_exchange, BusChannel, BusConnector, OutgoingMessage, CONTROL_EXCHANGE, ROUTING_START,
};
use crate::error::{BusError, DispatchError};
use crate::protocol::StartRequest;

pub const STARTED: &str = "started";

/// Returned to the caller once the start request has been accepted by the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartAck {
    pub status: String,
    pub scenario: String,
    pub run_id: String,
    pub ts: String,
}

/// Publishes start requests over one cached channel. A failed publish drops
/// the channel and the next call reconnects; there is no retry within a call.
pub struct DispatchService {
    connector: Arc<dyn BusConnector>,
    channel: Mutex<Option<Arc<dyn BusChannel>>>,
}

impl DispatchService {
    pub fn new(connector: Arc<dyn BusConnector>) -> Self {
        Self {
            connector,
            channel: Mutex::new(None),
        }
    }

    /// Scenario names are not checked against any catalog; the worker reports
    /// unknown ones on the event stream.
    pub async fn start(&self, scenario: &str) -> Result<StartAck, DispatchError> {
        let scenario = scenario.trim();
        if scenario.is_empty() {
            return Err(DispatchError::InvalidArgument(
                "Scenario name is required".to_string(),
            ));
        }

        let run_id = Uuid::new_v4().to_string();
        let request = StartRequest::new(scenario, run_id.as_str());
        let message = OutgoingMessage::json(&request).map_err(DispatchError::BusUnavailable)?;

        if let Err(e) = self.publish(message).await {
            tracing::warn!(scenario = %scenario, run_id = %run_id, error = %e, "dispatch failed");
            self.channel.lock().await.take();
            return Err(DispatchError::BusUnavailable(e));
        }

        tracing::info!(scenario = %scenario, run_id = %run_id, "scenario dispatched");
        Ok(StartAck {
            status: STARTED.to_string(),
            scenario: scenario.to_string(),
            run_id,
            ts: request.ts,
        })
    }

    async fn publish(&self, message: OutgoingMessage) -> Result<(), BusError> {
        let channel = self.channel().await?;
        channel
            .publish(CONTROL_EXCHANGE, ROUTING_START, message)
            .await
    }

    async fn channel(&self) -> Result<Arc<dyn BusChannel>, BusError> {
        let mut cached = self.channel.lock().await;
        if let Some(channel) = cached.as_ref() {
            return Ok(channel.clone());
        }
        let channel = self.connector.connect().await?;
        channel.declare_exchange(&control_exchange()).await?;
        *cached = Some(channel.clone());
        Ok(channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{MemoryBus, QueueBinding, Subscription, WORKER_CONTROL_QUEUE};
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;
    use std::time::Duration;

    async fn control_queue(bus: &MemoryBus) -> Box<dyn Subscription> {
        let channel = bus.connect().await.unwrap();
        channel.declare_exchange(&control_exchange()).await.unwrap();
        channel
            .subscribe(&QueueBinding::durable(
                WORKER_CONTROL_QUEUE,
                CONTROL_EXCHANGE,
                ROUTING_START,
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_start_publishes_request() {
        let bus = MemoryBus::new();
        let mut queue = control_queue(&bus).await;
        let service = DispatchService::new(Arc::new(bus));

        let ack = service.start("  db_latency ").await.unwrap();
        assert_eq!(ack.status, "started");
        assert_eq!(ack.scenario, "db_latency");

        let delivery = queue.next().await.unwrap().unwrap();
        assert_eq!(delivery.routing_key, "scenario.start");
        let req: StartRequest = serde_json::from_slice(&delivery.body).unwrap();
        assert_eq!(req.scenario, "db_latency");
        assert_eq!(req.run_id, ack.run_id);
        assert_eq!(req.source, "scenario-runner");
        assert_eq!(req.ty, "scenario.start");
    }

    #[tokio::test]
    async fn test_blank_name_is_rejected_and_nothing_published() {
        let bus = MemoryBus::new();
        let mut queue = control_queue(&bus).await;
        let service = DispatchService::new(Arc::new(bus));

        for name in ["", "   ", "\t\n"] {
            let err = service.start(name).await.unwrap_err();
            assert!(matches!(err, DispatchError::InvalidArgument(_)));
        }

        let nothing = tokio::time::timeout(Duration::from_millis(50), queue.next()).await;
        assert!(nothing.is_err());
    }

    #[tokio::test]
    async fn test_unknown_names_are_dispatched() {
        let bus = MemoryBus::new();
        let _queue = control_queue(&bus).await;
        let service = DispatchService::new(Arc::new(bus));
        assert!(service.start("nonexistent_scenario").await.is_ok());
    }

    #[tokio::test]
    async fn test_run_ids_are_unique() {
        let bus = MemoryBus::new();
        let _queue = control_queue(&bus).await;
        let service = DispatchService::new(Arc::new(bus));

        let mut seen = HashSet::new();
        for _ in 0..50 {
            let ack = service.start("cpu_spike").await.unwrap();
            assert!(seen.insert(ack.run_id));
        }
    }

    #[tokio::test]
    async fn test_bus_failure_then_lazy_reconnect() {
        let bus = MemoryBus::new();
        let mut queue = control_queue(&bus).await;
        let service = DispatchService::new(Arc::new(bus.clone()));
        service.start("disk_full").await.unwrap();
        queue.next().await.unwrap().unwrap();

        bus.set_available(false);
        let err = service.start("disk_full").await.unwrap_err();
        assert!(matches!(err, DispatchError::BusUnavailable(_)));
        assert!(err.to_string().starts_with("Failed to dispatch scenario"));

        bus.set_available(true);
        // durable control queue kept its binding across the outage
        let ack = service.start("disk_full").await.unwrap();
        let mut queue = control_queue(&bus).await;
        let delivery = queue.next().await.unwrap().unwrap();
        let req: StartRequest = serde_json::from_slice(&delivery.body).unwrap();
        assert_eq!(req.run_id, ack.run_id);
    }
}
