/// Coordinator mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SimulationMode {
    #[default]
    Idle,
    Recording,
    Playback,
}

impl SimulationMode {
    pub fn label(self) -> &'static str {
        match self {
            SimulationMode::Idle => "Idle",
            SimulationMode::Recording => "Recording",
            SimulationMode::Playback => "Playback",
        }
    }
}

/// Snapshot of the coordinator handed to every observer for one notification.
///
/// Observers read mode, clock and shared sample count from here instead of
/// reaching back into the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameContext {
    pub mode: SimulationMode,
    /// Driver time elapsed since the previous tick
    pub delta_ms: f32,
    /// Fixed time between two samples, also the duration of one playback segment
    pub sample_interval_ms: f32,
    /// Samples taken in the current or most recent take
    pub sample_count: usize,
    /// Total driver time seen by the coordinator
    pub scene_time_ms: f64,
}

/// What a single coordinator tick produced for outside listeners.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TickOutcome {
    /// New playback fraction, only when it changed this tick
    pub progress: Option<f32>,
    /// Playback reached its end this tick
    pub ended: bool,
}
