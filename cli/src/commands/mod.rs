pub mod cli;
pub mod scenarios;
pub mod serve;
pub mod trigger;
