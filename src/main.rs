use bevy::prelude::*;
use bevy_egui::EguiPlugin;

use sim_replay::config::{load_config, AppConfig};
use sim_replay::simulation::{SimulationHelper, SimulationPlugin};
use sim_replay::SimulationError;

mod controls;
mod scene;

use controls::ControlsPlugin;

fn main() -> Result<(), SimulationError> {
    let config = load_config();
    // Bad sampling settings are fatal; refuse to open a window.
    let helper = SimulationHelper::new(&config.simulation)?;

    App::new()
        .add_plugins((
            DefaultPlugins.set(WindowPlugin {
                primary_window: Some(Window {
                    title: "Sim Replay - Physics Take Recorder".to_string(),
                    resolution: (1280, 720).into(),
                    ..default()
                }),
                ..default()
            }),
            EguiPlugin::default(),
            SimulationPlugin,
            ControlsPlugin,
        ))
        .insert_resource(ClearColor(Color::srgb(0.08, 0.09, 0.11)))
        .insert_resource(config)
        .insert_resource(helper)
        .add_systems(Startup, (scene::setup_scene, log_settings))
        .run();

    Ok(())
}

fn log_settings(config: Res<AppConfig>) {
    let settings = &config.simulation;
    info!(
        "Sampling {} samples/s against a {} Hz driver, gravity {:?}, {} solver iterations",
        settings.samples_per_second,
        settings.driver_tick_rate,
        settings.gravity,
        settings.solver_iterations
    );
}
