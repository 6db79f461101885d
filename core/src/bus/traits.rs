use std::sync::Arc;

use async_trait::async_trait;

use crate::error::BusError;

use super::types::{Delivery, ExchangeSpec, OutgoingMessage, QueueBinding};

/// Opens connections to a broker. Implementations must be cheap to call
/// repeatedly: the supervisors call `connect` after every failure.
#[async_trait]
pub trait BusConnector: Send + Sync {
    fn name(&self) -> &str;
    async fn connect(&self) -> Result<Arc<dyn BusChannel>, BusError>;
}

/// One live connection/channel. Declarations are idempotent.
#[async_trait]
pub trait BusChannel: Send + Sync {
    async fn declare_exchange(&self, spec: &ExchangeSpec) -> Result<(), BusError>;

    /// Publish and wait until the broker has accepted the message.
    async fn publish(
        &self,
        exchange: &str,
        routing_key: &str,
        message: OutgoingMessage,
    ) -> Result<(), BusError>;

    /// Declare the queue, bind it, and start consuming.
    async fn subscribe(&self, binding: &QueueBinding) -> Result<Box<dyn Subscription>, BusError>;
}

#[async_trait]
pub trait Subscription: Send {
    /// Next delivery. `None` means the consumer was cancelled or the
    /// connection went away; callers treat it like a disconnect.
    async fn next(&mut self) -> Option<Result<Delivery, BusError>>;
}
