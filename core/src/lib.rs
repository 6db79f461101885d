pub mod api;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod protocol;
pub mod relay;
