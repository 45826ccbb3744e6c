use bevy::prelude::*;

use sim_replay::physics::{Dynamics, Impulse};
use sim_replay::simulation::{SimulationHelper, SimulationMesh, Subject};

const BALL_RADIUS: f32 = 1.0;
const BALL_MASS: f32 = 1.0;
const GROUND_SIZE: f32 = 32.0;
const GROUND_THICKNESS: f32 = 0.2;
const RESTITUTION: f32 = 0.9;

/// Spawn camera, light, ground and two balls, and hand the physical objects to the coordinator.
pub fn setup_scene(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut helper: ResMut<SimulationHelper>,
) {
    commands.spawn((
        Camera3d::default(),
        Transform::from_xyz(0.0, 5.0, -35.0).looking_at(Vec3::new(0.0, 3.0, 0.0), Vec3::Y),
    ));
    commands.spawn((
        DirectionalLight {
            illuminance: 10_000.0,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(4.0, 20.0, -8.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));

    let sphere = meshes.add(Sphere::new(BALL_RADIUS));

    let ball = commands
        .spawn((
            Name::new("ball"),
            Mesh3d(sphere.clone()),
            MeshMaterial3d(materials.add(Color::srgb(0.9, 0.35, 0.25))),
            Transform::from_xyz(0.0, 2.0, 0.0),
        ))
        .id();

    let ball2 = commands
        .spawn((
            Name::new("ball2"),
            Mesh3d(sphere),
            MeshMaterial3d(materials.add(Color::srgb(0.25, 0.55, 0.9))),
            Transform::from_xyz(2.0, 1.0, 0.0),
        ))
        .id();

    // Top face sits at y = 0.
    let ground = commands
        .spawn((
            Name::new("ground"),
            Mesh3d(meshes.add(Cuboid::new(GROUND_SIZE, GROUND_THICKNESS, GROUND_SIZE))),
            MeshMaterial3d(materials.add(Color::srgb(0.3, 0.5, 0.3))),
            Transform::from_xyz(0.0, -GROUND_THICKNESS / 2.0, 0.0),
        ))
        .id();

    helper.attach(Box::new(
        SimulationMesh::new(ball)
            .with_dynamics(Dynamics::sphere(BALL_RADIUS, BALL_MASS, RESTITUTION))
            .with_impulse(Impulse::new(Vec3::new(1.0, 20.0, -1.0), Vec3::new(1.0, 2.0, 0.0))),
    ));
    helper.attach(Box::new(
        SimulationMesh::new(ball2)
            .with_dynamics(Dynamics::sphere(BALL_RADIUS, BALL_MASS, RESTITUTION))
            .with_impulse(Impulse::new(Vec3::new(1.0, 10.0, -1.0), Vec3::new(1.0, 3.0, 0.0))),
    ));
    helper.attach(Box::new(SimulationMesh::new(ground).with_dynamics(Dynamics::cuboid(
        Vec3::new(GROUND_SIZE, GROUND_THICKNESS, GROUND_SIZE) / 2.0,
        0.0,
        RESTITUTION,
    ))));

    info!("Scene ready, tracking {} objects", helper.observer_count());
}
