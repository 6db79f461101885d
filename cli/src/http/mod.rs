//! HTTP surfaces: dispatch API, relay WebSocket, worker metrics.

pub mod client;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod server;
pub mod state;
pub mod ws;

pub use models::*;
pub use server::*;
pub use state::*;
