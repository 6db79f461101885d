#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use incidentops_core::api::{
    ControlConsumer, DispatchService, IncidentMetrics, LogEvent, MemoryBus, RelayConsumer,
    ScenarioCatalog, ScenarioEngine, SessionRegistry, Supervisor, WORKER_CONTROL_QUEUE,
};
use tokio::sync::{broadcast, mpsc};

pub const BACKOFF: Duration = Duration::from_secs(2);

/// Dispatch, worker and relay wired to one in-process broker.
pub struct Harness {
    pub bus: MemoryBus,
    pub dispatch: DispatchService,
    pub engine: Arc<ScenarioEngine>,
    pub registry: Arc<SessionRegistry>,
    shutdown: broadcast::Sender<()>,
}

impl Harness {
    pub async fn start() -> Self {
        let bus = MemoryBus::new();
        let (shutdown, _) = broadcast::channel(1);

        let engine = Arc::new(ScenarioEngine::new(
            Arc::new(ScenarioCatalog::builtin().clone()),
            IncidentMetrics::new().unwrap(),
            BACKOFF,
        ));
        let registry = Arc::new(SessionRegistry::new());

        let worker = Arc::new(ControlConsumer::new(engine.clone(), WORKER_CONTROL_QUEUE));
        let supervisor = Supervisor::new(Arc::new(bus.clone()), BACKOFF);
        let rx = shutdown.subscribe();
        tokio::spawn(async move { supervisor.run(worker, rx).await });

        let relay = Arc::new(RelayConsumer::new(registry.clone()));
        let supervisor = Supervisor::new(Arc::new(bus.clone()), BACKOFF);
        let rx = shutdown.subscribe();
        tokio::spawn(async move { supervisor.run(relay, rx).await });

        // let both consumers declare and bind
        tokio::time::sleep(Duration::from_millis(50)).await;

        Self {
            dispatch: DispatchService::new(Arc::new(bus.clone())),
            bus,
            engine,
            registry,
            shutdown,
        }
    }

    pub async fn viewer(&self) -> mpsc::Receiver<String> {
        self.registry.register(256).await.1
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(());
    }
}

pub async fn collect(rx: &mut mpsc::Receiver<String>, count: usize) -> Vec<LogEvent> {
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        let text = rx.recv().await.expect("viewer channel closed");
        out.push(serde_json::from_str(&text).expect("relay forwarded invalid json"));
    }
    out
}

/// Events received within `window` after the last one, for asserting that
/// nothing further arrives.
pub async fn drain(rx: &mut mpsc::Receiver<String>, window: Duration) -> Vec<String> {
    let mut out = Vec::new();
    while let Ok(Some(text)) = tokio::time::timeout(window, rx.recv()).await {
        out.push(text);
    }
    out
}
