//! Shared state handed to each service's handlers.

use std::sync::Arc;

use incidentops_core::api::{DispatchService, IncidentMetrics, SessionRegistry};

#[derive(Clone)]
pub struct DispatchState {
    pub service: Arc<DispatchService>,
}

impl DispatchState {
    pub fn new(service: DispatchService) -> Self {
        Self {
            service: Arc::new(service),
        }
    }
}

#[derive(Clone)]
pub struct RelayState {
    pub registry: Arc<SessionRegistry>,
    /// Per-viewer outbound queue length.
    pub session_buffer: usize,
}

#[derive(Clone)]
pub struct WorkerState {
    pub metrics: IncidentMetrics,
}
