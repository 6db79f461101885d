use std::path::PathBuf;

use clap::{Args as ClapArgs, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "incidentops", version, about = "Incident scenario dispatch, playback and live relay")]
pub struct Args {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file to load instead of ~/.incidentops/config.toml or ./config.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override `bus.url` (`amqp://...` or `memory://`).
    #[arg(long, global = true)]
    pub bus_url: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Accept start requests over HTTP and publish them to the control exchange.
    Dispatch,
    /// Play scenarios from the control queue and expose /metrics.
    Worker,
    /// Forward bus events to WebSocket viewers on /ws/events.
    Relay,
    /// Run dispatch, worker and relay in one process on one bus.
    All,
    /// Ask a running dispatch service to start a scenario.
    Trigger(TriggerArgs),
    /// List the built-in scenarios.
    Scenarios,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct TriggerArgs {
    pub scenario: String,

    #[arg(long, default_value = "http://localhost:8003")]
    pub url: String,
}
