use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("server failed: {0}")]
    Server(String),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Failures raised by a bus transport. Every variant is treated as transient by
/// the supervisors: they log, back off and reconnect.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    #[error("bus unreachable: {0}")]
    Unreachable(String),
    #[error("bus connection lost")]
    Disconnected,
    #[error("exchange '{0}' is not declared")]
    UnknownExchange(String),
    #[error("exchange '{name}' redeclared with a different kind")]
    ExchangeKindMismatch { name: String },
    #[error("transport error: {0}")]
    Transport(String),
    #[error("message encode failed: {0}")]
    Encode(String),
}

impl From<serde_json::Error> for BusError {
    fn from(e: serde_json::Error) -> Self {
        BusError::Encode(e.to_string())
    }
}

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Failed to dispatch scenario to the bus: {0}")]
    BusUnavailable(#[source] BusError),
}
