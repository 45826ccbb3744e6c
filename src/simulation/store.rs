use bevy::prelude::*;

/// Position and orientation of a tracked object at one sampling tick.
///
/// Orientation is always stored as a quaternion so a whole take interpolates
/// consistently. Euler input is converted once on ingest, see
/// [`TransformSample::from_euler`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransformSample {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl TransformSample {
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation: rotation.normalize(),
        }
    }

    /// Build a sample from Euler angles (radians) in the given rotation order.
    pub fn from_euler(translation: Vec3, order: EulerRot, a: f32, b: f32, c: f32) -> Self {
        Self::new(translation, Quat::from_euler(order, a, b, c))
    }

    /// Write translation and rotation onto a transform. Scale is left alone.
    pub fn apply_to(&self, transform: &mut Transform) {
        transform.translation = self.translation;
        transform.rotation = self.rotation;
    }

    /// Blend towards `to`: linear for translation, slerp (shortest arc) for rotation.
    /// `t` is clamped to `[0, 1]`.
    pub fn interpolate(&self, to: &TransformSample, t: f32) -> TransformSample {
        let t = t.clamp(0.0, 1.0);
        TransformSample {
            translation: self.translation.lerp(to.translation, t),
            rotation: self.rotation.slerp(to.rotation, t),
        }
    }
}

impl Default for TransformSample {
    fn default() -> Self {
        Self {
            translation: Vec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl From<&Transform> for TransformSample {
    fn from(transform: &Transform) -> Self {
        Self::new(transform.translation, transform.rotation)
    }
}

impl From<Transform> for TransformSample {
    fn from(transform: Transform) -> Self {
        Self::from(&transform)
    }
}

/// Ordered samples of one tracked object for the current (or last) take.
///
/// Append-only while recording, cleared when a new take begins, read by index
/// during playback. Out-of-range reads return `None` rather than failing.
#[derive(Debug, Clone, Default)]
pub struct SampleTrack {
    samples: Vec<TransformSample>,
}

impl SampleTrack {
    pub fn push(&mut self, sample: TransformSample) {
        self.samples.push(sample);
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&TransformSample> {
        self.samples.get(index)
    }

    pub fn first(&self) -> Option<&TransformSample> {
        self.samples.first()
    }

    pub fn last(&self) -> Option<&TransformSample> {
        self.samples.last()
    }

    pub fn last_index(&self) -> Option<usize> {
        self.samples.len().checked_sub(1)
    }

    /// Samples `index` and `index + 1`, or `None` when no further motion is available.
    pub fn segment(&self, index: usize) -> Option<(&TransformSample, &TransformSample)> {
        let next = index.checked_add(1)?;
        Some((self.samples.get(index)?, self.samples.get(next)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = &TransformSample> {
        self.samples.iter()
    }
}

impl FromIterator<TransformSample> for SampleTrack {
    fn from_iter<I: IntoIterator<Item = TransformSample>>(iter: I) -> Self {
        Self {
            samples: iter.into_iter().collect(),
        }
    }
}
