use bevy::prelude::*;

use super::{
    FrameContext, SampleTrack, SceneTransforms, SimulationMode, SimulationObserver, SubjectId,
    TrackPhase, TransformSample,
};
use crate::physics::{Dynamics, Impulse, PhysicsBackend};

/// Interpolation from one sample to the next, advanced by driver time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    from: TransformSample,
    to: TransformSample,
    elapsed_ms: f32,
    duration_ms: f32,
}

impl Tween {
    pub fn new(from: TransformSample, to: TransformSample, duration_ms: f32) -> Self {
        Self {
            from,
            to,
            elapsed_ms: 0.0,
            duration_ms: duration_ms.max(0.0),
        }
    }

    /// Consume up to `delta_ms` and return whatever time is left over.
    pub fn advance(&mut self, delta_ms: f32) -> f32 {
        let remaining = self.duration_ms - self.elapsed_ms;
        if delta_ms >= remaining {
            self.elapsed_ms = self.duration_ms;
            delta_ms - remaining
        } else {
            self.elapsed_ms += delta_ms;
            0.0
        }
    }

    pub fn fraction(&self) -> f32 {
        if self.duration_ms <= 0.0 {
            1.0
        } else {
            (self.elapsed_ms / self.duration_ms).clamp(0.0, 1.0)
        }
    }

    pub fn is_finished(&self) -> bool {
        self.elapsed_ms >= self.duration_ms
    }

    pub fn pose(&self) -> TransformSample {
        self.from.interpolate(&self.to, self.fraction())
    }
}

/// Records and replays the transform of one scene entity.
///
/// Physics setup (dynamics, optional initial impulse) runs once at the start
/// of every take because the backend drops all bodies when it is disabled.
#[derive(Debug, Clone)]
pub struct SimulationMesh {
    target: Entity,
    dynamics: Option<Dynamics>,
    impulse: Option<Impulse>,
    track: SampleTrack,
    phase: TrackPhase,
    cursor: usize,
    tween: Option<Tween>,
    subject: Option<SubjectId>,
}

impl SimulationMesh {
    pub fn new(target: Entity) -> Self {
        Self {
            target,
            dynamics: None,
            impulse: None,
            track: SampleTrack::default(),
            phase: TrackPhase::Idle,
            cursor: 0,
            tween: None,
            subject: None,
        }
    }

    pub fn with_dynamics(mut self, dynamics: Dynamics) -> Self {
        self.dynamics = Some(dynamics);
        self
    }

    pub fn with_impulse(mut self, impulse: Impulse) -> Self {
        self.impulse = Some(impulse);
        self
    }

    pub fn tween(&self) -> Option<&Tween> {
        self.tween.as_ref()
    }

    fn prepare_take(&mut self, pose: &TransformSample, physics: &mut dyn PhysicsBackend) {
        self.track.clear();
        self.cursor = 0;
        self.tween = None;
        if let Some(dynamics) = &self.dynamics {
            physics.attach_dynamics(self.target, dynamics, pose);
        }
        if let Some(impulse) = &self.impulse {
            physics.apply_impulse(self.target, impulse.impulse, impulse.contact_point);
        }
        self.phase = TrackPhase::Recording;
    }

    pub fn on_record_tick(&mut self, scene: &mut dyn SceneTransforms, physics: &mut dyn PhysicsBackend) {
        let Some(sample) = scene.read(self.target) else {
            debug!("Tracked entity {:?} not in scene, sample skipped", self.target);
            return;
        };
        if self.phase != TrackPhase::Recording {
            self.prepare_take(&sample, physics);
        }
        self.track.push(sample);
    }

    pub fn on_idle_tick(&mut self, scene: &mut dyn SceneTransforms) {
        match self.phase {
            TrackPhase::Recording => {
                // Take just finished: back to the start pose.
                if let Some(first) = self.track.first() {
                    scene.write(self.target, first);
                }
                self.cursor = 0;
                self.phase = TrackPhase::Idle;
            }
            TrackPhase::AwaitingFirstSample => {
                // The take ended before this object captured anything.
                self.track.clear();
                self.cursor = 0;
                self.tween = None;
                self.phase = TrackPhase::Idle;
            }
            TrackPhase::Playing => {
                // Paused: keep the in-flight tween so a resume continues from this pose.
                self.phase = TrackPhase::Idle;
            }
            TrackPhase::Idle => {}
        }
    }

    pub fn on_playback_tick(&mut self, frame: &FrameContext, scene: &mut dyn SceneTransforms) {
        self.phase = TrackPhase::Playing;
        let Some(last) = self.track.last_index() else {
            return;
        };
        if self.cursor >= last {
            self.tween = None;
            return;
        }

        let mut budget = frame.delta_ms.max(0.0);
        loop {
            if self.tween.is_none() {
                let Some((from, to)) = self.track.segment(self.cursor) else {
                    break;
                };
                self.tween = Some(Tween::new(*from, *to, frame.sample_interval_ms));
            }
            let Some(tween) = self.tween.as_mut() else {
                break;
            };

            budget = tween.advance(budget);
            let pose = tween.pose();
            if !tween.is_finished() {
                scene.write(self.target, &pose);
                break;
            }

            self.cursor += 1;
            self.tween = None;
            if self.cursor >= last || budget <= 0.0 {
                scene.write(self.target, &pose);
                break;
            }
        }
    }
}

impl SimulationObserver for SimulationMesh {
    fn target(&self) -> Entity {
        self.target
    }

    fn bind(&mut self, subject: Option<SubjectId>) {
        self.subject = subject;
    }

    fn subject(&self) -> Option<SubjectId> {
        self.subject
    }

    fn begin_take(&mut self) {
        self.tween = None;
        self.phase = TrackPhase::AwaitingFirstSample;
    }

    fn update(
        &mut self,
        frame: &FrameContext,
        scene: &mut dyn SceneTransforms,
        physics: &mut dyn PhysicsBackend,
    ) {
        match frame.mode {
            SimulationMode::Recording => self.on_record_tick(scene, physics),
            SimulationMode::Playback => self.on_playback_tick(frame, scene),
            SimulationMode::Idle => self.on_idle_tick(scene),
        }
    }

    fn seek(&mut self, cursor: usize, scene: &mut dyn SceneTransforms) {
        let Some(last) = self.track.last_index() else {
            return;
        };
        if self.phase == TrackPhase::Recording {
            self.phase = TrackPhase::Idle;
        }
        self.cursor = cursor.min(last);
        self.tween = None;
        if let Some(sample) = self.track.get(self.cursor) {
            scene.write(self.target, sample);
        }
    }

    fn rewind(&mut self) {
        self.cursor = 0;
        self.tween = None;
    }

    fn cursor(&self) -> usize {
        self.cursor
    }

    fn phase(&self) -> TrackPhase {
        self.phase
    }

    fn track(&self) -> &SampleTrack {
        &self.track
    }
}
