//! Publish/subscribe transport contract shared by every service.
//!
//! Two logical topics live on the same broker: the control exchange carries
//! start requests from dispatch to the worker, the event exchange fans log
//! events out to every relay.

pub mod memory;
pub mod supervisor;
pub mod traits;
pub mod types;

pub use memory::{topic_matches, MemoryBus};
pub use supervisor::{BusWorker, Supervisor, SupervisorStats};
pub use traits::{BusChannel, BusConnector, Subscription};
pub use types::{
    Delivery, DeliveryAck, ExchangeKind, ExchangeSpec, OutgoingMessage, QueueBinding,
};

pub const CONTROL_EXCHANGE: &str = "ioa.control";
pub const EVENTS_EXCHANGE: &str = "events";
pub const ROUTING_START: &str = "scenario.start";
pub const WORKER_CONTROL_QUEUE: &str = "ioa.worker.control";

pub fn control_exchange() -> ExchangeSpec {
    ExchangeSpec::topic(CONTROL_EXCHANGE)
}

pub fn events_exchange() -> ExchangeSpec {
    ExchangeSpec::fanout(EVENTS_EXCHANGE)
}
