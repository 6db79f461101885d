//! Scenario execution: control-queue consumer plus timed playback.
mod consumer;
mod publisher;
mod run;
mod types;

pub use consumer::ControlConsumer;
pub use publisher::EventPublisher;
pub use run::ScenarioEngine;
pub use types::PlaybackOutcome;
