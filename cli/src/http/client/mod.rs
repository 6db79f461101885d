//! Clients for the running services.

pub mod dispatch;

pub use dispatch::DispatchClient;
