/// How a single playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// Every step was published and its delay elapsed.
    Completed { steps: usize },
    /// The catalog had no entry; one error event was published instead.
    UnknownScenario,
}

impl PlaybackOutcome {
    pub fn events_published(&self) -> usize {
        match self {
            Self::Completed { steps } => *steps,
            Self::UnknownScenario => 1,
        }
    }
}
