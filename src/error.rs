//! Error types for the simulation coordinator and its settings file.

use thiserror::Error;

/// Configuration problems detected when the coordinator is constructed.
///
/// These are fatal: the application refuses to start rather than run with a
/// sampling clock that can never fire.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimulationError {
    /// Sample rate is not positive, not finite, or faster than the driver ticks.
    #[error(
        "invalid sample rate: {samples_per_second} samples/s (driver ticks at {driver_tick_rate} Hz)"
    )]
    InvalidSampleRate {
        samples_per_second: f32,
        driver_tick_rate: f32,
    },

    /// The physics solver needs at least one iteration per step.
    #[error("invalid solver iteration count: {0}")]
    InvalidSolverIterations(u32),
}

/// Failure to write the settings file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to write config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}
