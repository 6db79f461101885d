//! Per-scenario run metrics.
//!
//! Gauges are keyed by scenario only, so concurrent runs of the same scenario
//! overwrite each other's `incident_active` / `incident_step` values and the
//! first run to finish resets them for all. Counters and histograms aggregate
//! across runs.

use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder,
};

use crate::protocol::Severity;

#[derive(Clone)]
pub struct IncidentMetrics {
    registry: Registry,
    active: IntGaugeVec,
    step: IntGaugeVec,
    runs: IntCounterVec,
    step_duration: HistogramVec,
    events: IntCounterVec,
    playback_duration: HistogramVec,
}

impl IncidentMetrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let active = IntGaugeVec::new(
            Opts::new("incident_active", "1 if scenario is running"),
            &["scenario"],
        )?;
        let step = IntGaugeVec::new(
            Opts::new("incident_step", "Current step number"),
            &["scenario"],
        )?;
        let runs = IntCounterVec::new(
            Opts::new("incident_runs_total", "Total scenario runs started"),
            &["scenario"],
        )?;
        let step_duration = HistogramVec::new(
            HistogramOpts::new("incident_step_duration_seconds", "Step duration seconds"),
            &["scenario"],
        )?;
        let events = IntCounterVec::new(
            Opts::new("incident_events_total", "Total incident events emitted"),
            &["scenario", "level"],
        )?;
        let playback_duration = HistogramVec::new(
            HistogramOpts::new(
                "incident_scenario_duration_seconds",
                "Total duration of scenario execution",
            ),
            &["scenario"],
        )?;

        registry.register(Box::new(active.clone()))?;
        registry.register(Box::new(step.clone()))?;
        registry.register(Box::new(runs.clone()))?;
        registry.register(Box::new(step_duration.clone()))?;
        registry.register(Box::new(events.clone()))?;
        registry.register(Box::new(playback_duration.clone()))?;

        Ok(Self {
            registry,
            active,
            step,
            runs,
            step_duration,
            events,
            playback_duration,
        })
    }

    /// Count a run, mark the scenario active at step 0, and return a guard
    /// that clears both gauges when dropped.
    pub fn begin_run(&self, scenario: &str) -> ActiveRunGuard {
        self.runs.with_label_values(&[scenario]).inc();
        self.active.with_label_values(&[scenario]).set(1);
        self.step.with_label_values(&[scenario]).set(0);
        ActiveRunGuard {
            metrics: self.clone(),
            scenario: scenario.to_string(),
        }
    }

    pub fn set_step(&self, scenario: &str, step: u32) {
        self.step
            .with_label_values(&[scenario])
            .set(i64::from(step));
    }

    pub fn observe_step(&self, scenario: &str, seconds: f64) {
        self.step_duration
            .with_label_values(&[scenario])
            .observe(seconds);
    }

    pub fn record_event(&self, scenario: &str, level: Severity) {
        self.events
            .with_label_values(&[scenario, level.as_str()])
            .inc();
    }

    pub fn observe_playback(&self, scenario: &str, seconds: f64) {
        self.playback_duration
            .with_label_values(&[scenario])
            .observe(seconds);
    }

    fn clear(&self, scenario: &str) {
        self.active.with_label_values(&[scenario]).set(0);
        self.step.with_label_values(&[scenario]).set(0);
    }

    pub fn active(&self, scenario: &str) -> i64 {
        self.active.with_label_values(&[scenario]).get()
    }

    pub fn current_step(&self, scenario: &str) -> i64 {
        self.step.with_label_values(&[scenario]).get()
    }

    pub fn runs_total(&self, scenario: &str) -> u64 {
        self.runs.with_label_values(&[scenario]).get()
    }

    pub fn events_total(&self, scenario: &str, level: Severity) -> u64 {
        self.events
            .with_label_values(&[scenario, level.as_str()])
            .get()
    }

    pub fn step_observations(&self, scenario: &str) -> u64 {
        self.step_duration
            .with_label_values(&[scenario])
            .get_sample_count()
    }

    pub fn playback_observations(&self, scenario: &str) -> u64 {
        self.playback_duration
            .with_label_values(&[scenario])
            .get_sample_count()
    }

    /// Prometheus text exposition of every registered family.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let families = self.registry.gather();
        let mut buf = Vec::new();
        TextEncoder::new().encode(&families, &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

/// Resets the scenario's active flag and current step when dropped, which
/// covers normal completion, early return, panic unwinding and task abort.
pub struct ActiveRunGuard {
    metrics: IncidentMetrics,
    scenario: String,
}

impl Drop for ActiveRunGuard {
    fn drop(&mut self) {
        self.metrics.clear(&self.scenario);
    }
}
