//! Long-running service roles.

use std::sync::Arc;
use std::time::Duration;

use incidentops_core::api::{
    AppConfig, BusConnector, BusWorker, CliError, ControlConsumer, DispatchService, IncidentMetrics,
    MemoryBus, RelayConsumer, ScenarioCatalog, ScenarioEngine, SessionRegistry, Supervisor,
};
use incidentops_plugins::factory::{build_connector, redact_url};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::http::routes::{dispatch_router, relay_router, worker_router};
use crate::http::{start_server, DispatchState, RelayState, ServerConfig, WorkerState};

pub fn connector(
    cfg: &AppConfig,
    shared: Option<&MemoryBus>,
) -> Result<Arc<dyn BusConnector>, CliError> {
    let connector =
        build_connector(&cfg.bus, shared).map_err(|e| CliError::Config(e.to_string()))?;
    tracing::info!(
        transport = connector.name(),
        url = %redact_url(&cfg.bus.url),
        "bus transport selected"
    );
    Ok(connector)
}

fn spawn_supervisor(
    cfg: &AppConfig,
    connector: Arc<dyn BusConnector>,
    worker: Arc<dyn BusWorker>,
    shutdown_tx: &broadcast::Sender<()>,
) -> JoinHandle<()> {
    let backoff = Duration::from_millis(cfg.bus.reconnect_backoff_ms);
    let supervisor = Supervisor::new(connector, backoff);
    let shutdown_rx = shutdown_tx.subscribe();
    tokio::spawn(async move {
        supervisor.run(worker, shutdown_rx).await;
    })
}

pub async fn run_dispatch(
    cfg: &AppConfig,
    connector: Arc<dyn BusConnector>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), CliError> {
    let state = DispatchState::new(DispatchService::new(connector));
    let server = ServerConfig {
        name: "dispatch",
        host: cfg.dispatch.host.clone(),
        port: cfg.dispatch.port,
    };
    start_server(server, dispatch_router(state), shutdown_tx).await
}

pub async fn run_worker(
    cfg: &AppConfig,
    connector: Arc<dyn BusConnector>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), CliError> {
    let metrics =
        IncidentMetrics::new().map_err(|e| CliError::Command(format!("metrics registry: {e}")))?;
    let engine = Arc::new(ScenarioEngine::new(
        Arc::new(ScenarioCatalog::builtin().clone()),
        metrics.clone(),
        Duration::from_millis(cfg.bus.reconnect_backoff_ms),
    ));
    let consumer = Arc::new(ControlConsumer::new(engine, cfg.bus.control_queue.clone()));
    let supervisor = spawn_supervisor(cfg, connector, consumer, &shutdown_tx);

    let server = ServerConfig {
        name: "worker",
        host: cfg.worker.host.clone(),
        port: cfg.worker.port,
    };
    let router = worker_router(WorkerState { metrics });
    let served = start_server(server, router, shutdown_tx.clone()).await;
    stop_supervisor(supervisor, &shutdown_tx).await;
    served
}

pub async fn run_relay(
    cfg: &AppConfig,
    connector: Arc<dyn BusConnector>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), CliError> {
    let registry = Arc::new(SessionRegistry::new());
    let consumer = Arc::new(RelayConsumer::new(registry.clone()));
    let supervisor = spawn_supervisor(cfg, connector, consumer, &shutdown_tx);

    let state = RelayState {
        registry,
        session_buffer: cfg.relay.session_buffer,
    };
    let server = ServerConfig {
        name: "relay",
        host: cfg.relay.host.clone(),
        port: cfg.relay.port,
    };
    let served = start_server(server, relay_router(state), shutdown_tx.clone()).await;
    stop_supervisor(supervisor, &shutdown_tx).await;
    served
}

/// All three roles on one bus. With `memory://` they share one in-process
/// broker.
pub async fn run_all(cfg: &AppConfig, shutdown_tx: broadcast::Sender<()>) -> Result<(), CliError> {
    let shared = MemoryBus::new();
    let connector = connector(cfg, Some(&shared))?;
    tokio::try_join!(
        run_dispatch(cfg, connector.clone(), shutdown_tx.clone()),
        run_worker(cfg, connector.clone(), shutdown_tx.clone()),
        run_relay(cfg, connector, shutdown_tx.clone()),
    )
    .map(|_| ())
}

/// A server that failed to start leaves its supervisor running; stop it.
async fn stop_supervisor(handle: JoinHandle<()>, shutdown_tx: &broadcast::Sender<()>) {
    let _ = shutdown_tx.send(());
    if let Err(e) = handle.await {
        tracing::warn!("bus supervisor task failed: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use incidentops_core::api::MEMORY_BUS_URL;

    fn memory_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.bus.url = MEMORY_BUS_URL.to_string();
        cfg.dispatch.host = "127.0.0.1".into();
        cfg.dispatch.port = 0;
        cfg.relay.host = "127.0.0.1".into();
        cfg.relay.port = 0;
        cfg.worker.host = "127.0.0.1".into();
        cfg.worker.port = 0;
        cfg
    }

    #[tokio::test]
    async fn test_run_all_stops_on_shutdown() {
        let cfg = memory_config();
        let (shutdown_tx, _rx) = broadcast::channel(4);
        let tx = shutdown_tx.clone();
        let handle = tokio::spawn(async move { run_all(&cfg, tx).await });

        tokio::time::sleep(Duration::from_millis(100)).await;
        shutdown_tx.send(()).unwrap();
        assert!(handle.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_bind_failure_is_server_error() {
        let mut cfg = memory_config();
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        cfg.worker.port = taken.local_addr().unwrap().port();
        let (shutdown_tx, _rx) = broadcast::channel(4);

        let connector = connector(&cfg, None).unwrap();
        let err = run_worker(&cfg, connector, shutdown_tx).await.unwrap_err();
        assert!(matches!(err, CliError::Server(_)));
    }
}
