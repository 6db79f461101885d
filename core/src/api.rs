//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `incidentops_core::api` instead of reaching into internal modules.

pub use crate::bus::{
    control_exchange, events_exchange, BusChannel, BusConnector, BusWorker, Delivery,
    DeliveryAck, ExchangeKind, ExchangeSpec, MemoryBus, OutgoingMessage, QueueBinding,
    Subscription, Supervisor, SupervisorStats, CONTROL_EXCHANGE, EVENTS_EXCHANGE, ROUTING_START,
    WORKER_CONTROL_QUEUE,
};
pub use crate::catalog::{ScenarioCatalog, ScenarioDefinition, ScenarioStep};
pub use crate::config::{
    load_default, load_from, AppConfig, BusConfig, ListenConfig, LoggingConfig, RelayConfig,
    WorkerConfig, MEMORY_BUS_URL,
};
pub use crate::dispatch::{DispatchService, StartAck};
pub use crate::engine::{ControlConsumer, EventPublisher, PlaybackOutcome, ScenarioEngine};
pub use crate::error::{BusError, CliError, DispatchError};
pub use crate::metrics::{ActiveRunGuard, IncidentMetrics};
pub use crate::protocol::{now_ts, LogEvent, Severity, StartRequest};
pub use crate::relay::{BroadcastReport, RelayConsumer, SessionId, SessionRegistry};
