use clap::Parser;
use incidentops_cli::commands::{cli, scenarios, serve, trigger};
use incidentops_cli::http::spawn_signal_listener;
use incidentops_core::api::{AppConfig, CliError, LoggingConfig};
use tokio::sync::broadcast;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

static LOG_GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
    std::sync::OnceLock::new();

#[tokio::main]
async fn main() {
    let exit = match real_main().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{e}");
            exit_code_for_error(&e)
        }
    };

    std::process::exit(exit);
}

async fn real_main() -> Result<i32, CliError> {
    let args = cli::Args::parse();
    let mut cfg = match args.config.as_deref() {
        Some(path) => incidentops_core::config::load_from(path),
        None => incidentops_core::config::load_default(),
    }
    .map_err(|e| CliError::Config(e.to_string()))?;
    if let Some(url) = args.bus_url {
        cfg.bus.url = url;
    }
    init_tracing(&cfg.logging).map_err(CliError::Command)?;

    dispatch(args.command, cfg).await
}

fn exit_code_for_error(e: &CliError) -> i32 {
    // 0: success
    // 11: config error
    // 20: server / IO error
    // 50: internal/uncategorized
    match e {
        CliError::Config(_) => 11,
        CliError::Server(_) => 20,
        CliError::Io(_) => 20,
        CliError::Command(_) => 20,
        CliError::Bus(_) => 50,
        CliError::Anyhow(_) => 50,
    }
}

async fn dispatch(cmd: cli::Commands, cfg: AppConfig) -> Result<i32, CliError> {
    match cmd {
        cli::Commands::Scenarios => Ok(scenarios::handle_scenarios()),
        cli::Commands::Trigger(args) => trigger::handle_trigger(args).await,
        cli::Commands::Dispatch => {
            let connector = serve::connector(&cfg, None)?;
            serve::run_dispatch(&cfg, connector, shutdown_channel()).await?;
            Ok(0)
        }
        cli::Commands::Worker => {
            let connector = serve::connector(&cfg, None)?;
            serve::run_worker(&cfg, connector, shutdown_channel()).await?;
            Ok(0)
        }
        cli::Commands::Relay => {
            let connector = serve::connector(&cfg, None)?;
            serve::run_relay(&cfg, connector, shutdown_channel()).await?;
            Ok(0)
        }
        cli::Commands::All => {
            serve::run_all(&cfg, shutdown_channel()).await?;
            Ok(0)
        }
    }
}

/// Shutdown channel fed by Ctrl+C / SIGTERM.
fn shutdown_channel() -> broadcast::Sender<()> {
    let (shutdown_tx, _) = broadcast::channel(4);
    spawn_signal_listener(shutdown_tx.clone());
    shutdown_tx
}

fn init_tracing(logging: &LoggingConfig) -> Result<(), String> {
    if !logging.enabled {
        return Ok(());
    }

    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new(logging.level.clone()).map_err(|e| e.to_string())?,
    };

    let mut maybe_writer = None;

    if logging.file {
        let dir = match logging
            .directory
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
        {
            Some(d) => std::path::PathBuf::from(d),
            None => std::env::temp_dir().join("incidentops"),
        };

        std::fs::create_dir_all(&dir).map_err(|e| format!("create log dir failed: {e}"))?;
        let file_name = format!("incidentops.{}.log", std::process::id());
        let appender = tracing_appender::rolling::never(dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(appender);
        let _ = LOG_GUARD.set(guard);
        maybe_writer = Some(non_blocking);
    }

    if !logging.console && maybe_writer.is_none() {
        return Err("logging disabled for both console and file".to_string());
    }

    let console_layer = logging.console.then(|| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(atty::is(atty::Stream::Stderr))
    });

    let file_layer = maybe_writer.map(|w| {
        tracing_subscriber::fmt::layer()
            .with_writer(w)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    Ok(())
}
