//! Fan-out of bus events to connected viewers.
mod consumer;
mod registry;

pub use consumer::RelayConsumer;
pub use registry::{BroadcastReport, SessionId, SessionRegistry};
