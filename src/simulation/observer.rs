//! Subject/observer contract between the coordinator and tracked objects.
//!
//! The coordinator owns its observers. Each observer keeps only a
//! [`SubjectId`] naming the coordinator it belongs to, and receives all
//! coordinator state it needs through a [`FrameContext`].

use bevy::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use super::{FrameContext, SampleTrack, TransformSample};
use crate::physics::PhysicsBackend;

/// Non-owning handle to a coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubjectId(u32);

impl SubjectId {
    pub(crate) fn next() -> Self {
        static NEXT: AtomicU32 = AtomicU32::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-object lifecycle across takes and playback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackPhase {
    /// At rest; holds the samples of the last take, if any
    #[default]
    Idle,
    /// A take has started but this object has not captured its first sample yet
    AwaitingFirstSample,
    /// Capturing samples; the track holds at least one sample
    Recording,
    /// Replaying the track
    Playing,
}

/// Read/write access to the transforms of scene objects.
///
/// Implemented over a Bevy `Query<&mut Transform>` by the plugin, and over a
/// plain map for headless use.
pub trait SceneTransforms {
    fn read(&self, target: Entity) -> Option<TransformSample>;

    /// Returns `false` when the target no longer exists.
    fn write(&mut self, target: Entity, sample: &TransformSample) -> bool;
}

impl SceneTransforms for HashMap<Entity, TransformSample> {
    fn read(&self, target: Entity) -> Option<TransformSample> {
        self.get(&target).copied()
    }

    fn write(&mut self, target: Entity, sample: &TransformSample) -> bool {
        match self.get_mut(&target) {
            Some(slot) => {
                *slot = *sample;
                true
            }
            None => false,
        }
    }
}

/// A tracked object driven by a coordinator.
pub trait SimulationObserver: Send + Sync {
    /// Scene object this observer records and replays. Identity for set semantics.
    fn target(&self) -> Entity;

    /// Link to (or unlink from) the owning coordinator.
    fn bind(&mut self, subject: Option<SubjectId>);

    fn subject(&self) -> Option<SubjectId>;

    /// A new take started; the sample buffer is cleared lazily on the first record tick.
    fn begin_take(&mut self);

    /// Receive one notification from the coordinator.
    fn update(
        &mut self,
        frame: &FrameContext,
        scene: &mut dyn SceneTransforms,
        physics: &mut dyn PhysicsBackend,
    );

    /// Jump to a sample and pose the target there immediately.
    fn seek(&mut self, cursor: usize, scene: &mut dyn SceneTransforms);

    /// Move the cursor back to the first sample without touching the scene.
    fn rewind(&mut self);

    fn cursor(&self) -> usize;

    fn phase(&self) -> TrackPhase;

    fn track(&self) -> &SampleTrack;

    fn sample_len(&self) -> usize {
        self.track().len()
    }

    /// No further playback motion is available for this observer.
    fn is_exhausted(&self) -> bool {
        self.track()
            .last_index()
            .is_none_or(|last| self.cursor() >= last)
    }
}

/// The coordinator side of the contract.
pub trait Subject {
    fn id(&self) -> SubjectId;

    /// Add an observer unless one with the same target is already attached.
    fn attach(&mut self, observer: Box<dyn SimulationObserver>) -> bool;

    /// Remove the observer for `target`, if attached.
    fn detach(&mut self, target: Entity) -> Option<Box<dyn SimulationObserver>>;

    /// Notify every observer in attachment order.
    fn notify(
        &mut self,
        frame: &FrameContext,
        scene: &mut dyn SceneTransforms,
        physics: &mut dyn PhysicsBackend,
    );
}
