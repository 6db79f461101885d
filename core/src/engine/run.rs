//! Timed playback of one scenario onto the event exchange.
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::catalog::ScenarioCatalog;
use crate::error::BusError;
use crate::metrics::IncidentMetrics;
use crate::protocol::{LogEvent, StartRequest};

use super::publisher::EventPublisher;
use super::types::PlaybackOutcome;

pub struct ScenarioEngine {
    catalog: Arc<ScenarioCatalog>,
    metrics: IncidentMetrics,
    publisher: EventPublisher,
}

impl ScenarioEngine {
    /// `retry` is the wait before a failed event publish is attempted again.
    pub fn new(catalog: Arc<ScenarioCatalog>, metrics: IncidentMetrics, retry: Duration) -> Self {
        Self {
            catalog,
            metrics,
            publisher: EventPublisher::new(retry),
        }
    }

    pub fn catalog(&self) -> &ScenarioCatalog {
        &self.catalog
    }

    pub fn metrics(&self) -> &IncidentMetrics {
        &self.metrics
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Run a playback on its own task. Errors are logged, never propagated to
    /// the consumer that received the request.
    pub fn spawn(self: &Arc<Self>, request: StartRequest) -> JoinHandle<()> {
        let engine = Arc::clone(self);
        tokio::spawn(async move {
            let StartRequest {
                scenario, run_id, ..
            } = request;
            match engine.play(&scenario, &run_id).await {
                Ok(outcome) => tracing::info!(
                    scenario = %scenario,
                    run_id = %run_id,
                    events = outcome.events_published(),
                    ?outcome,
                    "playback finished"
                ),
                Err(e) => tracing::error!(
                    scenario = %scenario,
                    run_id = %run_id,
                    error = %e,
                    "playback aborted"
                ),
            }
        })
    }

    pub async fn play(&self, scenario: &str, run_id: &str) -> Result<PlaybackOutcome, BusError> {
        let Some(definition) = self.catalog.get(scenario) else {
            tracing::warn!(scenario = %scenario, run_id = %run_id, "unknown scenario");
            self.publisher
                .publish(&LogEvent::unknown_scenario(scenario, run_id))
                .await?;
            return Ok(PlaybackOutcome::UnknownScenario);
        };

        let _guard = self.metrics.begin_run(scenario);
        tracing::info!(
            scenario = %scenario,
            run_id = %run_id,
            steps = definition.len(),
            "playback started"
        );

        let started = Instant::now();
        for (idx, step) in definition.steps().iter().enumerate() {
            let number = idx as u32 + 1;
            let step_started = Instant::now();
            self.metrics.set_step(scenario, number);

            let event = LogEvent::new(scenario, run_id, step.level, number, step.message.as_str());
            self.publisher.publish(&event).await?;
            self.metrics.record_event(scenario, step.level);
            tracing::debug!(scenario = %scenario, run_id = %run_id, step = number, "step published");

            tokio::time::sleep(step.duration).await;
            self.metrics
                .observe_step(scenario, step_started.elapsed().as_secs_f64());
        }
        self.metrics
            .observe_playback(scenario, started.elapsed().as_secs_f64());

        Ok(PlaybackOutcome::Completed {
            steps: definition.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::{
        events_exchange, BusChannel, BusConnector, MemoryBus, QueueBinding, Subscription,
        EVENTS_EXCHANGE,
    };
    use crate::catalog::{ScenarioDefinition, ScenarioStep};
    use crate::protocol::Severity;

    const RETRY: Duration = Duration::from_secs(2);

    async fn setup() -> (MemoryBus, Arc<dyn BusChannel>, Box<dyn Subscription>) {
        let bus = MemoryBus::new();
        let channel = bus.connect().await.unwrap();
        channel.declare_exchange(&events_exchange()).await.unwrap();
        let sub = channel
            .subscribe(&QueueBinding::exclusive(EVENTS_EXCHANGE))
            .await
            .unwrap();
        (bus, channel, sub)
    }

    async fn engine(channel: Arc<dyn BusChannel>) -> Arc<ScenarioEngine> {
        let engine = Arc::new(ScenarioEngine::new(
            Arc::new(ScenarioCatalog::builtin().clone()),
            IncidentMetrics::new().unwrap(),
            RETRY,
        ));
        engine.publisher().attach(channel).await;
        engine
    }

    async fn next_event(sub: &mut Box<dyn Subscription>) -> LogEvent {
        let delivery = sub.next().await.unwrap().unwrap();
        serde_json::from_slice(&delivery.body).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_db_latency_plays_in_order() {
        let (_bus, channel, mut sub) = setup().await;
        let engine = engine(channel).await;

        let outcome = engine.play("db_latency", "run-1").await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::Completed { steps: 9 });

        let expected = ScenarioCatalog::builtin().get("db_latency").unwrap();
        for (idx, step) in expected.steps().iter().enumerate() {
            let ev = next_event(&mut sub).await;
            assert_eq!(ev.step, idx as u32 + 1);
            assert_eq!(ev.level, step.level);
            assert_eq!(ev.message, step.message);
            assert_eq!(ev.run_id, "run-1");
            assert_eq!(ev.scenario, "db_latency");
        }

        let metrics = engine.metrics();
        assert_eq!(metrics.runs_total("db_latency"), 1);
        assert_eq!(metrics.active("db_latency"), 0);
        assert_eq!(metrics.current_step("db_latency"), 0);
        assert_eq!(metrics.step_observations("db_latency"), 9);
        assert_eq!(metrics.events_total("db_latency", Severity::Success), 2);
        assert_eq!(metrics.playback_observations("db_latency"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_published_before_step_delay() {
        let (_bus, channel, mut sub) = setup().await;
        let engine = engine(channel).await;
        let handle = engine.spawn(StartRequest::new("crash_loop", "run-2"));

        // first step has a 0.8s delay; its event is already out
        tokio::time::sleep(Duration::from_millis(100)).await;
        let ev = next_event(&mut sub).await;
        assert_eq!(ev.step, 1);
        assert_eq!(engine.metrics().active("crash_loop"), 1);
        assert_eq!(engine.metrics().current_step("crash_loop"), 1);

        handle.await.unwrap();
        assert_eq!(engine.metrics().active("crash_loop"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unknown_scenario_emits_single_error() {
        let (_bus, channel, mut sub) = setup().await;
        let engine = engine(channel).await;

        let outcome = engine.play("nonexistent_scenario", "run-3").await.unwrap();
        assert_eq!(outcome, PlaybackOutcome::UnknownScenario);

        let ev = next_event(&mut sub).await;
        assert_eq!(ev.level, Severity::Error);
        assert_eq!(ev.step, 0);
        assert!(ev.message.contains("nonexistent_scenario"));
        assert_eq!(engine.metrics().runs_total("nonexistent_scenario"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_abort_resets_gauges() {
        let (_bus, channel, _sub) = setup().await;
        let engine = engine(channel).await;
        let handle = engine.spawn(StartRequest::new("memory_leak", "run-4"));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(engine.metrics().active("memory_leak"), 1);
        assert_eq!(engine.metrics().current_step("memory_leak"), 3);

        handle.abort();
        assert!(handle.await.unwrap_err().is_cancelled());
        assert_eq!(engine.metrics().active("memory_leak"), 0);
        assert_eq!(engine.metrics().current_step("memory_leak"), 0);
        assert_eq!(engine.metrics().playback_observations("memory_leak"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_mid_playback_resumes_on_new_channel() {
        let (bus, channel, _old_sub) = setup().await;
        let catalog = ScenarioCatalog::from_definitions([(
            "short",
            ScenarioDefinition::new(vec![
                ScenarioStep::new(Severity::Info, "one", 1.0),
                ScenarioStep::new(Severity::Warn, "two", 1.0),
                ScenarioStep::new(Severity::Success, "three", 1.0),
            ])
            .unwrap(),
        )]);
        let engine = ScenarioEngine::new(Arc::new(catalog), IncidentMetrics::new().unwrap(), RETRY);
        engine.publisher().attach(channel).await;

        let play = engine.play("short", "run-5");
        let reconnect = async {
            tokio::time::sleep(Duration::from_millis(500)).await;
            bus.disconnect_all();
            // step two fails at 1.0s; the new channel is in place before its retry
            tokio::time::sleep(Duration::from_secs(1)).await;
            assert_eq!(engine.metrics().active("short"), 1);
            let fresh = bus.connect().await.unwrap();
            let sub = fresh
                .subscribe(&QueueBinding::exclusive(EVENTS_EXCHANGE))
                .await
                .unwrap();
            engine.publisher().attach(fresh).await;
            sub
        };
        let (result, mut new_sub) = tokio::join!(play, reconnect);

        assert_eq!(result.unwrap(), PlaybackOutcome::Completed { steps: 3 });
        assert_eq!(next_event(&mut new_sub).await.step, 2);
        assert_eq!(next_event(&mut new_sub).await.step, 3);
        assert_eq!(engine.metrics().active("short"), 0);
        assert_eq!(engine.metrics().runs_total("short"), 1);
        assert_eq!(engine.metrics().playback_observations("short"), 1);
    }
}
