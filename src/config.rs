use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

use crate::error::{ConfigError, SimulationError};

const CONFIG_FILE: &str = "simulation.toml";

#[derive(Resource, Serialize, Deserialize, Clone, Debug, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub simulation: SimulationSettings,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct SimulationSettings {
    /// Samples captured per second of driver time
    pub samples_per_second: f32,
    /// Nominal frame rate of the render loop
    pub driver_tick_rate: f32,
    /// Gravity applied while recording (m/s^2)
    pub gravity: [f32; 3],
    /// Physics solver iterations per step
    pub solver_iterations: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            samples_per_second: 30.0,
            driver_tick_rate: 60.0,
            gravity: [0.0, -9.81, 0.0],
            solver_iterations: 10,
        }
    }
}

impl SimulationSettings {
    pub fn gravity(&self) -> Vec3 {
        Vec3::from_array(self.gravity)
    }

    /// A sample rate above the driver's tick rate would leave the sampling clock
    /// unable to keep up, so it is rejected up front.
    pub fn validate(&self) -> Result<(), SimulationError> {
        let rate = self.samples_per_second;
        let driver = self.driver_tick_rate;
        if !rate.is_finite() || rate <= 0.0 || !driver.is_finite() || rate > driver {
            return Err(SimulationError::InvalidSampleRate {
                samples_per_second: rate,
                driver_tick_rate: driver,
            });
        }
        if self.solver_iterations == 0 {
            return Err(SimulationError::InvalidSolverIterations(self.solver_iterations));
        }
        Ok(())
    }
}

pub fn parse_config(contents: &str) -> Result<AppConfig, toml::de::Error> {
    toml::from_str(contents)
}

/// Load `simulation.toml` from the working directory.
pub fn load_config() -> AppConfig {
    load_config_from(Path::new(CONFIG_FILE))
}

/// A missing file is created with defaults. An unreadable or malformed file
/// is left as it is and defaults are used for this run.
pub fn load_config_from(path: &Path) -> AppConfig {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let config = AppConfig::default();
            if let Err(e) = save_config_to(path, &config) {
                warn!("Could not write default config: {}", e);
            }
            return config;
        }
        Err(e) => {
            warn!("Could not read {}: {}, using defaults", path.display(), e);
            return AppConfig::default();
        }
    };

    match parse_config(&contents) {
        Ok(config) => {
            info!("Loaded config from {}", path.display());
            config
        }
        Err(e) => {
            warn!("Ignoring malformed {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    let contents = toml::to_string_pretty(config)?;
    fs::write(path, contents)?;
    info!("Saved config to {}", path.display());
    Ok(())
}
