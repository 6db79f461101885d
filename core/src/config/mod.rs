mod load;
mod types;

pub use load::{get_data_dir, load_default, load_from};
pub use types::{
    AppConfig, BusConfig, ListenConfig, LoggingConfig, RelayConfig, WorkerConfig, MEMORY_BUS_URL,
};
