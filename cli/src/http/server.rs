//! Listener lifecycle shared by the dispatch, relay and worker services.

use super::middleware::{create_middleware_stack, request_logger};
use axum::{middleware, Router};
use incidentops_core::api::CliError;
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::info;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub name: &'static str,
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn addr(&self) -> Result<SocketAddr, CliError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| CliError::Config(format!("{} listen address: {e}", self.name)))
    }
}

/// Serve `router` until a shutdown is broadcast.
pub async fn start_server(
    config: ServerConfig,
    router: Router,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), CliError> {
    let app = router
        .layer(middleware::from_fn(request_logger))
        .layer(create_middleware_stack());

    let addr = config.addr()?;
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| CliError::Server(format!("{} bind {addr} failed: {e}", config.name)))?;
    info!(service = config.name, "HTTP server listening on http://{}", addr);

    let mut shutdown_rx = shutdown_tx.subscribe();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
        })
        .await
        .map_err(|e| CliError::Server(format!("{}: {e}", config.name)))?;

    info!(service = config.name, "Server shutdown complete");
    Ok(())
}

/// Broadcast shutdown on Ctrl+C or SIGTERM.
pub fn spawn_signal_listener(shutdown_tx: broadcast::Sender<()>) {
    tokio::spawn(async move {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C signal");
            }
            _ = wait_for_sigterm() => {
                info!("Received SIGTERM signal");
            }
        }
        info!("Starting graceful shutdown...");
        let _ = shutdown_tx.send(());
    });
}

#[cfg(unix)]
async fn wait_for_sigterm() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            sigterm.recv().await;
        }
        Err(e) => {
            tracing::warn!("SIGTERM handler unavailable: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_sigterm() {
    std::future::pending::<()>().await
}
