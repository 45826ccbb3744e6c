use bevy::prelude::*;

use super::{SceneTransforms, SimulationHelper, TransformSample};
use crate::physics::{PhysicsPlugin, RapierBackend};

/// Control requests from UI or input collaborators.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub enum SimulationCommand {
    StartRecording,
    StopRecording,
    StartPlayback,
    StopPlayback,
    /// Scrub to a fraction of the take; clamped to `[0, 1]`
    SetPlaybackPosition(f32),
}

/// Playback completion fraction, sent whenever it changes.
#[derive(Message, Debug, Clone, Copy, PartialEq)]
pub struct PlaybackProgress(pub f32);

/// Playback reached the last sample.
#[derive(Message, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackEnded;

/// [`SceneTransforms`] over the ECS `Transform` components.
pub struct SceneQuery<'q, 'w, 's, 'a>(pub &'q mut Query<'w, 's, &'a mut Transform>);

impl SceneTransforms for SceneQuery<'_, '_, '_, '_> {
    fn read(&self, target: Entity) -> Option<TransformSample> {
        self.0.get(target).ok().map(TransformSample::from)
    }

    fn write(&mut self, target: Entity, sample: &TransformSample) -> bool {
        match self.0.get_mut(target) {
            Ok(mut transform) => {
                sample.apply_to(&mut transform);
                true
            }
            Err(_) => false,
        }
    }
}

/// Apply queued [`SimulationCommand`]s to the coordinator.
pub fn apply_simulation_commands(
    mut commands: MessageReader<SimulationCommand>,
    mut helper: ResMut<SimulationHelper>,
    mut physics: RapierBackend,
    mut transforms: Query<&mut Transform>,
) {
    for command in commands.read() {
        match *command {
            SimulationCommand::StartRecording => helper.start_recording(&mut physics),
            SimulationCommand::StopRecording => helper.stop_recording(&mut physics),
            SimulationCommand::StartPlayback => helper.start_playback(),
            SimulationCommand::StopPlayback => helper.stop_playback(),
            SimulationCommand::SetPlaybackPosition(fraction) => {
                let mut scene = SceneQuery(&mut transforms);
                helper.set_playback_position(fraction, &mut scene);
            }
        }
    }
}

/// Per-frame driver: ticks the coordinator with the frame delta and publishes progress.
pub fn drive_simulation(
    time: Res<Time>,
    mut helper: ResMut<SimulationHelper>,
    mut physics: RapierBackend,
    mut transforms: Query<&mut Transform>,
    mut progress: MessageWriter<PlaybackProgress>,
    mut ended: MessageWriter<PlaybackEnded>,
) {
    let elapsed_ms = time.delta_secs() * 1000.0;
    let mut scene = SceneQuery(&mut transforms);
    let outcome = helper.tick(elapsed_ms, &mut scene, &mut physics);

    if let Some(fraction) = outcome.progress {
        progress.write(PlaybackProgress(fraction));
    }
    if outcome.ended {
        ended.write(PlaybackEnded);
    }
}

/// Registers physics, the simulation messages and the driver systems.
///
/// The [`SimulationHelper`] resource is inserted by the application because
/// constructing it can fail on bad settings.
pub struct SimulationPlugin;

impl Plugin for SimulationPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(PhysicsPlugin)
            .add_message::<SimulationCommand>()
            .add_message::<PlaybackProgress>()
            .add_message::<PlaybackEnded>()
            .add_systems(
                Update,
                (apply_simulation_commands, drive_simulation)
                    .chain()
                    .run_if(resource_exists::<SimulationHelper>),
            );
    }
}
