//! Physics backend seam.
//!
//! The coordinator only ever switches the backend on and off and asks tracked
//! objects to attach their dynamics; how bodies move is the backend's business.
//! [`RapierBackend`] implements it over `bevy_rapier3d`: attaching inserts
//! rigid body and collider components, disabling removes them again.

use bevy::ecs::system::SystemParam;
use bevy::prelude::*;
use bevy_rapier3d::prelude::*;
use std::num::NonZeroUsize;

use crate::simulation::TransformSample;

/// Collision shape used when attaching dynamics to an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColliderShape {
    Sphere { radius: f32 },
    Box { half_extents: Vec3 },
}

impl ColliderShape {
    fn collider(&self) -> Collider {
        match *self {
            ColliderShape::Sphere { radius } => Collider::ball(radius),
            ColliderShape::Box { half_extents } => {
                Collider::cuboid(half_extents.x, half_extents.y, half_extents.z)
            }
        }
    }
}

/// Physical parameters for one object. A mass of zero makes the body static.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Dynamics {
    pub shape: ColliderShape,
    pub mass: f32,
    pub restitution: f32,
}

impl Dynamics {
    pub fn sphere(radius: f32, mass: f32, restitution: f32) -> Self {
        Self {
            shape: ColliderShape::Sphere { radius },
            mass,
            restitution,
        }
    }

    pub fn cuboid(half_extents: Vec3, mass: f32, restitution: f32) -> Self {
        Self {
            shape: ColliderShape::Box { half_extents },
            mass,
            restitution,
        }
    }

    pub fn is_static(&self) -> bool {
        self.mass <= 0.0
    }
}

/// Impulse applied once, right after dynamics are attached.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impulse {
    pub impulse: Vec3,
    /// World-space point the impulse acts on
    pub contact_point: Vec3,
}

impl Impulse {
    pub fn new(impulse: Vec3, contact_point: Vec3) -> Self {
        Self {
            impulse,
            contact_point,
        }
    }
}

/// What the coordinator and tracked objects need from a physics engine.
pub trait PhysicsBackend {
    fn enable(&mut self, gravity: Vec3, solver_iterations: u32);

    /// Turn simulation off. Attached dynamics are dropped and must be
    /// re-attached for the next take.
    fn disable(&mut self);

    fn is_enabled(&self) -> bool;

    fn attach_dynamics(&mut self, target: Entity, dynamics: &Dynamics, pose: &TransformSample);

    fn apply_impulse(&mut self, target: Entity, impulse: Vec3, contact_point: Vec3);
}

/// Impulse waiting for rapier to create the body it acts on.
#[derive(Debug, Clone, Copy, PartialEq)]
struct PendingImpulse {
    target: Entity,
    impulse: Vec3,
    /// Contact point relative to the body centre at attach time
    lever: Vec3,
}

/// Switch state and bookkeeping shared by [`RapierBackend`] and the sync systems.
#[derive(Resource, Debug, Default)]
pub struct PhysicsState {
    enabled: bool,
    gravity: Vec3,
    solver_iterations: u32,
    /// Entities with dynamics attached, and their centre at attach time
    bodies: Vec<(Entity, Vec3)>,
    pending_impulses: Vec<PendingImpulse>,
}

impl PhysicsState {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn gravity(&self) -> Vec3 {
        self.gravity
    }

    pub fn solver_iterations(&self) -> u32 {
        self.solver_iterations
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn has_body(&self, target: Entity) -> bool {
        self.bodies.iter().any(|(entity, _)| *entity == target)
    }
}

/// [`PhysicsBackend`] over `bevy_rapier3d`, usable as a system parameter.
#[derive(SystemParam)]
pub struct RapierBackend<'w, 's> {
    commands: Commands<'w, 's>,
    state: ResMut<'w, PhysicsState>,
}

impl PhysicsBackend for RapierBackend<'_, '_> {
    fn enable(&mut self, gravity: Vec3, solver_iterations: u32) {
        self.state.enabled = true;
        self.state.gravity = gravity;
        self.state.solver_iterations = solver_iterations.max(1);
        debug!(
            "Physics enabled: gravity {:?}, {} solver iterations",
            gravity, self.state.solver_iterations
        );
    }

    fn disable(&mut self) {
        self.state.enabled = false;
        self.state.pending_impulses.clear();
        for (target, _) in std::mem::take(&mut self.state.bodies) {
            if let Ok(mut entity) = self.commands.get_entity(target) {
                entity.try_remove::<(
                    RigidBody,
                    Collider,
                    Restitution,
                    ColliderMassProperties,
                    ExternalImpulse,
                    Velocity,
                )>();
            }
        }
        debug!("Physics disabled");
    }

    fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    fn attach_dynamics(&mut self, target: Entity, dynamics: &Dynamics, pose: &TransformSample) {
        let Ok(mut entity) = self.commands.get_entity(target) else {
            warn!("Cannot attach dynamics to missing entity {:?}", target);
            return;
        };

        let restitution = Restitution {
            coefficient: dynamics.restitution,
            combine_rule: CoefficientCombineRule::Multiply,
        };
        if dynamics.is_static() {
            entity.try_insert((RigidBody::Fixed, dynamics.shape.collider(), restitution));
        } else {
            entity.try_insert((
                RigidBody::Dynamic,
                dynamics.shape.collider(),
                restitution,
                ColliderMassProperties::Mass(dynamics.mass),
                Velocity::zero(),
            ));
        }

        let state = &mut *self.state;
        state.pending_impulses.retain(|p| p.target != target);
        match state.bodies.iter_mut().find(|(entity, _)| *entity == target) {
            Some(body) => body.1 = pose.translation,
            None => state.bodies.push((target, pose.translation)),
        }
    }

    fn apply_impulse(&mut self, target: Entity, impulse: Vec3, contact_point: Vec3) {
        let Some(centre) = self
            .state
            .bodies
            .iter()
            .find(|(entity, _)| *entity == target)
            .map(|(_, centre)| *centre)
        else {
            warn!("Impulse on {:?} ignored: no dynamics attached", target);
            return;
        };
        self.state.pending_impulses.push(PendingImpulse {
            target,
            impulse,
            lever: contact_point - centre,
        });
    }
}

/// Push the switch, gravity and solver iterations into the rapier context.
pub fn sync_rapier_configuration(
    state: Res<PhysicsState>,
    mut configs: Query<&mut RapierConfiguration, With<DefaultRapierContext>>,
    mut simulations: Query<&mut RapierContextSimulation, With<DefaultRapierContext>>,
) {
    for mut config in &mut configs {
        if config.physics_pipeline_active != state.enabled {
            config.physics_pipeline_active = state.enabled;
        }
        if state.enabled && config.gravity != state.gravity {
            config.gravity = state.gravity;
        }
    }

    let Some(iterations) = NonZeroUsize::new(state.solver_iterations as usize) else {
        return;
    };
    for mut simulation in &mut simulations {
        if simulation.integration_parameters.num_solver_iterations != iterations.get() {
            simulation.integration_parameters.num_solver_iterations = iterations.get();
        }
    }
}

/// Hand queued impulses to rapier once their bodies exist.
///
/// Rapier creates bodies after the frame that inserted the components, and
/// only applies impulses that change on an existing body.
pub fn apply_pending_impulses(
    mut commands: Commands,
    mut state: ResMut<PhysicsState>,
    bodies: Query<&Transform, With<RapierRigidBodyHandle>>,
) {
    if state.pending_impulses.is_empty() {
        return;
    }

    state.pending_impulses.retain(|pending| {
        let Ok(transform) = bodies.get(pending.target) else {
            return true;
        };
        let centre = transform.translation;
        commands.entity(pending.target).try_insert(ExternalImpulse::at_point(
            pending.impulse,
            centre + pending.lever,
            centre,
        ));
        false
    });
}

/// Rapier plus the systems that keep it in step with [`PhysicsState`].
///
/// Physics starts switched off; the coordinator enables it for each take.
pub struct PhysicsPlugin;

impl Plugin for PhysicsPlugin {
    fn build(&self, app: &mut App) {
        app.add_plugins(RapierPhysicsPlugin::<NoUserData>::default())
            .init_resource::<PhysicsState>()
            .add_systems(Update, (sync_rapier_configuration, apply_pending_impulses));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use bevy::time::TimeUpdateStrategy;
    use std::time::Duration;

    fn physics_app() -> App {
        let mut app = App::new();
        app.add_plugins((MinimalPlugins, TransformPlugin, PhysicsPlugin))
            .insert_resource(TimeUpdateStrategy::ManualDuration(Duration::from_secs_f32(1.0 / 60.0)));
        // Spawns the default rapier context.
        app.update();
        app
    }

    fn with_backend(app: &mut App, f: impl FnOnce(&mut RapierBackend) + Send + Sync + 'static) {
        let mut f = Some(f);
        app.world_mut()
            .run_system_once(move |mut backend: RapierBackend| {
                if let Some(f) = f.take() {
                    f(&mut backend);
                }
            })
            .unwrap();
    }

    fn spawn_at(app: &mut App, translation: Vec3) -> Entity {
        app.world_mut().spawn(Transform::from_translation(translation)).id()
    }

    fn x_of(app: &App, entity: Entity) -> f32 {
        app.world().get::<Transform>(entity).unwrap().translation.x
    }

    #[test]
    fn starts_disabled() {
        let app = physics_app();
        let state = app.world().resource::<PhysicsState>();
        assert!(!state.is_enabled());
        assert_eq!(state.body_count(), 0);
    }

    #[test]
    fn enable_configures_the_rapier_context() {
        let mut app = physics_app();

        with_backend(&mut app, |physics| physics.enable(Vec3::new(0.0, -9.81, 0.0), 10));
        app.update();

        let state = app.world().resource::<PhysicsState>();
        assert!(state.is_enabled());
        assert_eq!(state.gravity(), Vec3::new(0.0, -9.81, 0.0));
        assert_eq!(state.solver_iterations(), 10);

        let mut configs = app
            .world_mut()
            .query_filtered::<&RapierConfiguration, With<DefaultRapierContext>>();
        let config = configs.single(app.world()).unwrap();
        assert!(config.physics_pipeline_active);
        assert_eq!(config.gravity, Vec3::new(0.0, -9.81, 0.0));
    }

    #[test]
    fn ball_falls_onto_the_ground() {
        let mut app = physics_app();
        let ground = spawn_at(&mut app, Vec3::new(0.0, -0.1, 0.0));
        let ball = spawn_at(&mut app, Vec3::new(0.0, 3.0, 0.0));

        with_backend(&mut app, move |physics| {
            physics.enable(Vec3::new(0.0, -9.81, 0.0), 10);
            let ground_pose = TransformSample::new(Vec3::new(0.0, -0.1, 0.0), Quat::IDENTITY);
            let ball_pose = TransformSample::new(Vec3::new(0.0, 3.0, 0.0), Quat::IDENTITY);
            physics.attach_dynamics(ground, &Dynamics::cuboid(Vec3::new(16.0, 0.1, 16.0), 0.0, 0.9), &ground_pose);
            physics.attach_dynamics(ball, &Dynamics::sphere(1.0, 1.0, 0.9), &ball_pose);
        });

        let mut lowest = f32::MAX;
        for _ in 0..180 {
            app.update();
            lowest = lowest.min(app.world().get::<Transform>(ball).unwrap().translation.y);
        }

        assert!(lowest < 2.5, "ball should fall, lowest {lowest}");
        assert!(lowest > 0.8, "ball sank into the ground, lowest {lowest}");
        let ground_y = app.world().get::<Transform>(ground).unwrap().translation.y;
        assert!((ground_y + 0.1).abs() < 1e-5);
    }

    #[test]
    fn spheres_collide_instead_of_passing_through() {
        let mut app = physics_app();
        let a = spawn_at(&mut app, Vec3::new(-3.0, 0.0, 0.0));
        let b = spawn_at(&mut app, Vec3::new(3.0, 0.0, 0.0));

        with_backend(&mut app, move |physics| {
            physics.enable(Vec3::ZERO, 10);
            for (entity, x, push) in [(a, -3.0, 5.0), (b, 3.0, -5.0)] {
                let pose = TransformSample::new(Vec3::new(x, 0.0, 0.0), Quat::IDENTITY);
                physics.attach_dynamics(entity, &Dynamics::sphere(1.0, 1.0, 0.9), &pose);
                physics.apply_impulse(entity, Vec3::new(push, 0.0, 0.0), pose.translation);
            }
        });

        for _ in 0..120 {
            app.update();
            assert!(x_of(&app, a) < x_of(&app, b), "spheres passed through each other");
        }

        assert!(x_of(&app, a) < -3.0, "a should bounce back, x = {}", x_of(&app, a));
        assert!(x_of(&app, b) > 3.0, "b should bounce back, x = {}", x_of(&app, b));
    }

    #[test]
    fn disable_drops_bodies_and_freezes_motion() {
        let mut app = physics_app();
        let ball = spawn_at(&mut app, Vec3::new(0.0, 5.0, 0.0));

        with_backend(&mut app, move |physics| {
            physics.enable(Vec3::new(0.0, -9.81, 0.0), 10);
            let pose = TransformSample::new(Vec3::new(0.0, 5.0, 0.0), Quat::IDENTITY);
            physics.attach_dynamics(ball, &Dynamics::sphere(1.0, 1.0, 0.9), &pose);
        });
        for _ in 0..10 {
            app.update();
        }
        assert!(app.world().resource::<PhysicsState>().has_body(ball));

        with_backend(&mut app, |physics| physics.disable());
        app.update();
        let frozen = app.world().get::<Transform>(ball).unwrap().translation.y;
        for _ in 0..10 {
            app.update();
        }

        assert!(app.world().get::<RigidBody>(ball).is_none());
        assert_eq!(app.world().resource::<PhysicsState>().body_count(), 0);
        assert_eq!(app.world().get::<Transform>(ball).unwrap().translation.y, frozen);
    }

    #[test]
    fn impulse_without_dynamics_is_ignored() {
        let mut app = physics_app();
        let ball = spawn_at(&mut app, Vec3::ZERO);

        with_backend(&mut app, move |physics| {
            physics.enable(Vec3::ZERO, 10);
            physics.apply_impulse(ball, Vec3::X, Vec3::ZERO);
        });
        app.update();

        assert!(app.world().get::<ExternalImpulse>(ball).is_none());
    }
}
