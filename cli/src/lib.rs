//! incidentops-cli library, exposed for unit tests.

pub mod commands;
pub mod http;
