use bevy::prelude::*;
use chrono::{DateTime, Local};

use super::{
    FrameContext, SceneTransforms, SimulationMode, SimulationObserver, Subject, SubjectId,
    TickOutcome,
};
use crate::config::SimulationSettings;
use crate::error::SimulationError;
use crate::physics::PhysicsBackend;

/// Summary of a finished take, kept for display only.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TakeSummary {
    pub started_at: DateTime<Local>,
    pub sample_count: usize,
    /// Driver time covered by the take
    pub duration_ms: f64,
}

/// Coordinator for recording and replaying tracked objects.
///
/// Owns the fixed-rate sampling clock and the `Idle / Recording / Playback`
/// state machine. The external driver calls [`SimulationHelper::tick`] once per
/// rendered frame with the elapsed time; everything else is the control surface.
#[derive(Resource)]
pub struct SimulationHelper {
    id: SubjectId,
    observers: Vec<Box<dyn SimulationObserver>>,
    mode: SimulationMode,
    samples_per_second: f32,
    sample_interval_ms: f32,
    accumulated_ms: f32,
    sample_count: usize,
    progress: f32,
    gravity: Vec3,
    solver_iterations: u32,
    scene_time_ms: f64,
    take_started: Option<(DateTime<Local>, f64)>,
    last_take: Option<TakeSummary>,
    /// Last playback ran to the end; the next start rewinds
    playback_finished: bool,
}

impl SimulationHelper {
    pub fn new(settings: &SimulationSettings) -> Result<Self, SimulationError> {
        settings.validate()?;
        Ok(Self {
            id: SubjectId::next(),
            observers: Vec::new(),
            mode: SimulationMode::Idle,
            samples_per_second: settings.samples_per_second,
            sample_interval_ms: 1000.0 / settings.samples_per_second,
            accumulated_ms: 0.0,
            sample_count: 0,
            progress: 0.0,
            gravity: settings.gravity(),
            solver_iterations: settings.solver_iterations,
            scene_time_ms: 0.0,
            take_started: None,
            last_take: None,
            playback_finished: false,
        })
    }

    pub fn mode(&self) -> SimulationMode {
        self.mode
    }

    pub fn is_recording(&self) -> bool {
        self.mode == SimulationMode::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.mode == SimulationMode::Playback
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    pub fn sample_interval_ms(&self) -> f32 {
        self.sample_interval_ms
    }

    /// Last emitted playback fraction.
    pub fn progress(&self) -> f32 {
        self.progress
    }

    pub fn last_take(&self) -> Option<&TakeSummary> {
        self.last_take.as_ref()
    }

    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    pub fn observers(&self) -> impl Iterator<Item = &dyn SimulationObserver> {
        self.observers
            .iter()
            .map(|o| -> &dyn SimulationObserver { o.as_ref() })
    }

    pub fn observer(&self, target: Entity) -> Option<&dyn SimulationObserver> {
        self.observers().find(|o| o.target() == target)
    }

    /// Begin a new take. Ignored while already recording or replaying.
    pub fn start_recording(&mut self, physics: &mut dyn PhysicsBackend) {
        match self.mode {
            SimulationMode::Recording => return,
            SimulationMode::Playback => {
                warn!("Cannot start recording during playback");
                return;
            }
            SimulationMode::Idle => {}
        }

        physics.enable(self.gravity, self.solver_iterations);
        self.accumulated_ms = 0.0;
        self.sample_count = 0;
        self.progress = 0.0;
        self.playback_finished = false;
        self.take_started = Some((Local::now(), self.scene_time_ms));
        for observer in &mut self.observers {
            observer.begin_take();
        }
        self.mode = SimulationMode::Recording;

        info!(
            "Started recording {} objects at {} samples/s",
            self.observers.len(),
            self.samples_per_second
        );
    }

    /// Finish the current take and switch physics off.
    pub fn stop_recording(&mut self, physics: &mut dyn PhysicsBackend) {
        if self.mode != SimulationMode::Recording {
            return;
        }

        physics.disable();
        self.mode = SimulationMode::Idle;

        if let Some((started_at, start_ms)) = self.take_started.take() {
            let summary = TakeSummary {
                started_at,
                sample_count: self.sample_count,
                duration_ms: self.scene_time_ms - start_ms,
            };
            info!(
                "Stopped recording. {} samples over {:.2}s",
                summary.sample_count,
                summary.duration_ms / 1000.0
            );
            self.last_take = Some(summary);
        }
    }

    pub fn start_playback(&mut self) {
        match self.mode {
            SimulationMode::Playback => return,
            SimulationMode::Recording => {
                warn!("Cannot start playback while recording");
                return;
            }
            SimulationMode::Idle => {}
        }
        if self.sample_count == 0 {
            debug!("Playback requested without recorded samples");
            return;
        }

        if self.playback_finished {
            for observer in &mut self.observers {
                observer.rewind();
            }
            self.playback_finished = false;
        }
        self.mode = SimulationMode::Playback;
        info!("Started playback of {} samples", self.sample_count);
    }

    /// Pause playback where it is. Progress reads 0 until the next start.
    pub fn stop_playback(&mut self) {
        if self.mode != SimulationMode::Playback {
            return;
        }
        self.mode = SimulationMode::Idle;
        self.progress = 0.0;
        info!("Stopped playback");
    }

    /// Scrub every tracked object to `fraction` of the take. Input is clamped to `[0, 1]`.
    ///
    /// The cursor is `round(fraction * (sample_count - 1))`, the inverse of
    /// [`SimulationHelper::progress`], so 1.0 lands on the last sample.
    pub fn set_playback_position(&mut self, fraction: f32, scene: &mut dyn SceneTransforms) {
        if self.mode == SimulationMode::Recording {
            debug!("Playback position ignored while recording");
            return;
        }

        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let cursor = match self.sample_count {
            0 | 1 => 0,
            n => (fraction * (n - 1) as f32).round() as usize,
        };
        for observer in &mut self.observers {
            observer.seek(cursor, scene);
        }
        self.playback_finished = false;
        debug!("Playback position set to {:.3} (sample {})", fraction, cursor);
    }

    /// Advance by one driver frame.
    pub fn tick(
        &mut self,
        elapsed_ms: f32,
        scene: &mut dyn SceneTransforms,
        physics: &mut dyn PhysicsBackend,
    ) -> TickOutcome {
        let elapsed_ms = if elapsed_ms.is_finite() { elapsed_ms.max(0.0) } else { 0.0 };
        self.scene_time_ms += f64::from(elapsed_ms);

        match self.mode {
            SimulationMode::Recording => {
                self.accumulated_ms += elapsed_ms;
                if self.accumulated_ms > self.sample_interval_ms {
                    // Carry the remainder so long takes keep the configured rate.
                    self.accumulated_ms -= self.sample_interval_ms;
                    self.sample_count += 1;
                    let frame = self.frame(elapsed_ms);
                    self.notify(&frame, scene, physics);
                }
                TickOutcome::default()
            }
            SimulationMode::Playback => {
                let frame = self.frame(elapsed_ms);
                self.notify(&frame, scene, physics);
                self.update_progress()
            }
            SimulationMode::Idle => {
                let frame = self.frame(elapsed_ms);
                self.notify(&frame, scene, physics);
                TickOutcome::default()
            }
        }
    }

    fn frame(&self, delta_ms: f32) -> FrameContext {
        FrameContext {
            mode: self.mode,
            delta_ms,
            sample_interval_ms: self.sample_interval_ms,
            sample_count: self.sample_count,
            scene_time_ms: self.scene_time_ms,
        }
    }

    /// Fraction for a cursor: the last sample maps to exactly 1.0.
    fn progress_for(&self, cursor: usize) -> f32 {
        match self.sample_count {
            0 | 1 => 1.0,
            n => (cursor as f32 / (n - 1) as f32).clamp(0.0, 1.0),
        }
    }

    fn update_progress(&mut self) -> TickOutcome {
        let furthest = self.observers.iter().map(|o| o.cursor()).max().unwrap_or(0);
        let halted = self.observers.iter().all(|o| o.is_exhausted());
        let progress = if halted { 1.0 } else { self.progress_for(furthest) };

        let mut outcome = TickOutcome::default();
        if progress != self.progress {
            self.progress = progress;
            outcome.progress = Some(progress);
        }
        if progress >= 1.0 {
            self.mode = SimulationMode::Idle;
            self.progress = 0.0;
            self.playback_finished = true;
            outcome.ended = true;
            info!("Playback finished");
        }
        outcome
    }
}

impl Subject for SimulationHelper {
    fn id(&self) -> SubjectId {
        self.id
    }

    fn attach(&mut self, mut observer: Box<dyn SimulationObserver>) -> bool {
        let target = observer.target();
        if self.observers.iter().any(|o| o.target() == target) {
            return false;
        }
        observer.bind(Some(self.id));
        if self.mode == SimulationMode::Recording {
            observer.begin_take();
        }
        self.observers.push(observer);
        debug!("Tracking {:?}", target);
        true
    }

    fn detach(&mut self, target: Entity) -> Option<Box<dyn SimulationObserver>> {
        let index = self.observers.iter().position(|o| o.target() == target)?;
        let mut observer = self.observers.remove(index);
        observer.bind(None);
        debug!("Stopped tracking {:?}", target);
        Some(observer)
    }

    fn notify(
        &mut self,
        frame: &FrameContext,
        scene: &mut dyn SceneTransforms,
        physics: &mut dyn PhysicsBackend,
    ) {
        for observer in &mut self.observers {
            observer.update(frame, scene, physics);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::Dynamics;
    use crate::simulation::{SimulationMesh, TrackPhase, TransformSample};
    use std::collections::HashMap;

    #[derive(Default)]
    struct SwitchPhysics {
        enabled: bool,
        enable_calls: usize,
        last_gravity: Vec3,
        last_iterations: u32,
    }

    impl PhysicsBackend for SwitchPhysics {
        fn enable(&mut self, gravity: Vec3, solver_iterations: u32) {
            self.enabled = true;
            self.enable_calls += 1;
            self.last_gravity = gravity;
            self.last_iterations = solver_iterations;
        }
        fn disable(&mut self) {
            self.enabled = false;
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn attach_dynamics(&mut self, _target: Entity, _dynamics: &Dynamics, _pose: &TransformSample) {}
        fn apply_impulse(&mut self, _target: Entity, _impulse: Vec3, _contact_point: Vec3) {}
    }

    fn helper() -> SimulationHelper {
        SimulationHelper::new(&SimulationSettings::default()).unwrap()
    }

    fn scene_with(count: usize) -> (HashMap<Entity, TransformSample>, Vec<Entity>) {
        let mut world = World::new();
        let mut scene = HashMap::new();
        let entities: Vec<Entity> = (0..count).map(|_| world.spawn_empty().id()).collect();
        for entity in &entities {
            scene.insert(*entity, TransformSample::default());
        }
        (scene, entities)
    }

    #[test]
    fn rejects_sample_rate_above_driver_rate() {
        let settings = SimulationSettings {
            samples_per_second: 120.0,
            driver_tick_rate: 60.0,
            ..default()
        };
        assert!(matches!(
            SimulationHelper::new(&settings),
            Err(SimulationError::InvalidSampleRate { .. })
        ));
    }

    #[test]
    fn attach_is_idempotent_and_binds_subject() {
        let mut helper = helper();
        let (_scene, entities) = scene_with(1);

        assert!(helper.attach(Box::new(SimulationMesh::new(entities[0]))));
        assert!(!helper.attach(Box::new(SimulationMesh::new(entities[0]))));

        assert_eq!(helper.observer_count(), 1);
        assert_eq!(helper.observer(entities[0]).unwrap().subject(), Some(helper.id()));
    }

    #[test]
    fn detach_unbinds_and_ignores_unknown_targets() {
        let mut helper = helper();
        let (_scene, entities) = scene_with(2);
        helper.attach(Box::new(SimulationMesh::new(entities[0])));

        assert!(helper.detach(entities[1]).is_none());
        let detached = helper.detach(entities[0]).unwrap();
        assert_eq!(detached.subject(), None);
        assert_eq!(helper.observer_count(), 0);
    }

    #[test]
    fn start_recording_enables_physics_once() {
        let mut helper = helper();
        let mut physics = SwitchPhysics::default();

        helper.start_recording(&mut physics);
        helper.start_recording(&mut physics);

        assert!(helper.is_recording());
        assert_eq!(physics.enable_calls, 1);
        assert_eq!(physics.last_gravity, Vec3::new(0.0, -9.81, 0.0));
        assert_eq!(physics.last_iterations, 10);

        helper.stop_recording(&mut physics);
        assert!(!physics.is_enabled());
        assert_eq!(helper.mode(), SimulationMode::Idle);
    }

    #[test]
    fn sub_interval_ticks_are_coalesced() {
        let mut helper = helper();
        let (mut scene, _entities) = scene_with(0);
        let mut physics = SwitchPhysics::default();
        helper.start_recording(&mut physics);

        // 30 samples/s => 33.3ms interval
        for _ in 0..3 {
            helper.tick(10.0, &mut scene, &mut physics);
        }
        assert_eq!(helper.sample_count(), 0);
        helper.tick(10.0, &mut scene, &mut physics);
        assert_eq!(helper.sample_count(), 1);
    }

    #[test]
    fn remainder_is_carried_between_samples() {
        let mut helper = helper();
        let (mut scene, _entities) = scene_with(0);
        let mut physics = SwitchPhysics::default();
        helper.start_recording(&mut physics);

        // 25ms ticks: 100 ticks = 2500ms = 75 intervals, minus the strict boundary.
        for _ in 0..100 {
            helper.tick(25.0, &mut scene, &mut physics);
        }
        assert!((74..=75).contains(&helper.sample_count()));
    }

    #[test]
    fn attaching_mid_take_records_from_next_sample() {
        let mut helper = helper();
        let (mut scene, entities) = scene_with(2);
        let mut physics = SwitchPhysics::default();
        helper.attach(Box::new(SimulationMesh::new(entities[0])));
        helper.start_recording(&mut physics);

        for _ in 0..10 {
            helper.tick(40.0, &mut scene, &mut physics);
        }
        helper.attach(Box::new(SimulationMesh::new(entities[1])));
        assert_eq!(helper.observer(entities[1]).unwrap().phase(), TrackPhase::AwaitingFirstSample);
        for _ in 0..5 {
            helper.tick(40.0, &mut scene, &mut physics);
        }

        assert_eq!(helper.observer(entities[0]).unwrap().sample_len(), 15);
        assert_eq!(helper.observer(entities[1]).unwrap().sample_len(), 5);
    }

    #[test]
    fn playback_without_samples_stays_idle() {
        let mut helper = helper();
        helper.start_playback();
        assert!(!helper.is_playing());
    }

    #[test]
    fn playback_ignored_while_recording() {
        let mut helper = helper();
        let mut physics = SwitchPhysics::default();
        helper.start_recording(&mut physics);
        helper.start_playback();
        assert!(helper.is_recording());
    }

    #[test]
    fn take_summary_covers_driver_time() {
        let mut helper = helper();
        let (mut scene, _entities) = scene_with(0);
        let mut physics = SwitchPhysics::default();
        helper.start_recording(&mut physics);
        for _ in 0..50 {
            helper.tick(20.0, &mut scene, &mut physics);
        }
        helper.stop_recording(&mut physics);

        let take = helper.last_take().unwrap();
        assert!((take.duration_ms - 1000.0).abs() < 1e-3);
        assert_eq!(take.sample_count, helper.sample_count());
    }

    #[test]
    fn non_finite_elapsed_time_is_ignored() {
        let mut helper = helper();
        let (mut scene, _entities) = scene_with(0);
        let mut physics = SwitchPhysics::default();
        helper.start_recording(&mut physics);

        helper.tick(f32::NAN, &mut scene, &mut physics);
        helper.tick(f32::INFINITY, &mut scene, &mut physics);
        helper.tick(-50.0, &mut scene, &mut physics);

        assert_eq!(helper.sample_count(), 0);
    }
}
