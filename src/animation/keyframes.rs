//! Keyframed values and node property animations.

use super::{Animatable, Apply, Sample, TimingFunction};
use crate::math::{color_matrix, rotate_2d, rotate_around_y};
use crate::scene::{NodeId, Scene};

/// Values pinned at normalized times in `0..=1`.
#[derive(Clone, Debug, PartialEq)]
pub struct KeyFrames<T: Animatable> {
    frames: Vec<(f32, T)>,
}

impl<T: Animatable> KeyFrames<T> {
    /// Two frames, `from` at 0 and `to` at 1.
    pub fn new(from: T, to: T) -> Self {
        Self {
            frames: vec![(0.0, from), (1.0, to)],
        }
    }

    /// Insert a frame, keeping frames ordered by time. A frame at an
    /// existing time replaces it.
    pub fn with_frame(mut self, time: f32, value: T) -> Self {
        assert!(
            (0.0..=1.0).contains(&time),
            "keyframe time {} outside 0..=1",
            time
        );
        match self.frames.binary_search_by(|(t, _)| t.total_cmp(&time)) {
            Ok(i) => self.frames[i].1 = value,
            Err(i) => self.frames.insert(i, (time, value)),
        }
        self
    }

    /// Number of frames, at least two.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Value at `progress`. Easing applies within each pair of frames.
    pub fn value_at(&self, progress: f32, timing: &TimingFunction) -> T {
        let progress = progress.clamp(0.0, 1.0);
        let next = self
            .frames
            .iter()
            .position(|(t, _)| *t >= progress)
            .unwrap_or(self.frames.len() - 1);
        if next == 0 {
            return self.frames[0].1.clone();
        }

        let (t0, from) = &self.frames[next - 1];
        let (t1, to) = &self.frames[next];
        let span = t1 - t0;
        let local = if span > 0.0 {
            (progress - t0) / span
        } else {
            1.0
        };
        from.interpolate(to, timing.evaluate(local))
    }
}

/// Node parameter a [`PropertyAnimation`] drives.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeProperty {
    /// Opacity node value, clamped to `0..=1`
    Opacity,
    /// Blur or shadow radius in pixels, rounded
    BlurRadius,
    /// Color filter set to [`color_matrix::saturation`]
    Saturation,
    Sepia,
    Brightness,
    Contrast,
    /// Hue rotation in radians
    Hue,
    Invert,
    /// Transform set to a rotation about z, in radians
    RotationZ,
    /// Transform set to a rotation about y, in radians
    RotationY,
}

impl NodeProperty {
    /// Write `value` into the property of `node`.
    pub fn set(self, scene: &mut Scene, node: NodeId, value: f32) {
        match self {
            NodeProperty::Opacity => scene.set_opacity(node, value.clamp(0.0, 1.0)),
            NodeProperty::BlurRadius => scene.set_blur_radius(node, value.round().max(0.0) as u32),
            NodeProperty::Saturation => {
                scene.set_color_matrix(node, color_matrix::saturation(value))
            }
            NodeProperty::Sepia => scene.set_color_matrix(node, color_matrix::sepia(value)),
            NodeProperty::Brightness => {
                scene.set_color_matrix(node, color_matrix::brightness(value))
            }
            NodeProperty::Contrast => scene.set_color_matrix(node, color_matrix::contrast(value)),
            NodeProperty::Hue => scene.set_color_matrix(node, color_matrix::hue(value)),
            NodeProperty::Invert => scene.set_color_matrix(node, color_matrix::invert(value)),
            NodeProperty::RotationZ => scene.set_matrix(node, rotate_2d(value)),
            NodeProperty::RotationY => scene.set_matrix(node, rotate_around_y(value)),
        }
    }
}

/// Leaf animation writing keyframed values into a node of the scene.
#[derive(Debug)]
pub struct PropertyAnimation {
    node: NodeId,
    property: NodeProperty,
    frames: KeyFrames<f32>,
    timing: TimingFunction,
}

impl PropertyAnimation {
    /// Animate `property` of `node` through `frames`, linearly by default.
    pub fn new(node: NodeId, property: NodeProperty, frames: KeyFrames<f32>) -> Self {
        Self {
            node,
            property,
            frames,
            timing: TimingFunction::Linear,
        }
    }

    /// Easing applied between each pair of frames.
    pub fn timing(mut self, timing: TimingFunction) -> Self {
        self.timing = timing;
        self
    }

    pub fn node(&self) -> NodeId {
        self.node
    }
}

impl Apply<Scene> for PropertyAnimation {
    fn apply(&mut self, sample: Sample, scene: &mut Scene) {
        if !scene.contains(self.node) {
            log::trace!("Animated node {:?} no longer exists", self.node);
            return;
        }
        let value = self.frames.value_at(sample.progress(), &self.timing);
        self.property.set(scene, self.node, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{ActiveDirection, Animation};

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_value_between_frames() {
        let frames = KeyFrames::new(0.0f32, 10.0).with_frame(0.5, 20.0);
        let linear = TimingFunction::Linear;
        assert!(approx_eq(frames.value_at(0.0, &linear), 0.0));
        assert!(approx_eq(frames.value_at(0.25, &linear), 10.0));
        assert!(approx_eq(frames.value_at(0.5, &linear), 20.0));
        assert!(approx_eq(frames.value_at(0.75, &linear), 15.0));
        assert!(approx_eq(frames.value_at(1.0, &linear), 10.0));
        assert!(approx_eq(frames.value_at(2.0, &linear), 10.0));
    }

    #[test]
    fn test_frame_at_existing_time_replaces() {
        let frames = KeyFrames::new(0.0f32, 1.0).with_frame(1.0, 5.0);
        assert_eq!(frames.len(), 2);
        assert!(approx_eq(frames.value_at(1.0, &TimingFunction::Linear), 5.0));
    }

    #[test]
    fn test_opacity_animation_drives_node() {
        let mut scene = Scene::new();
        let node = scene.create_opacity(1.0);
        let mut anim = Animation::new(
            10.0,
            PropertyAnimation::new(node, NodeProperty::Opacity, KeyFrames::new(1.0, 0.0)),
        );
        anim.set_running(true);

        anim.tick(5.0, ActiveDirection::Forwards, &mut scene);
        assert!(approx_eq(scene.opacity(node).opacity, 0.5));

        anim.tick(20.0, ActiveDirection::Forwards, &mut scene);
        assert!(approx_eq(scene.opacity(node).opacity, 0.0));
        assert!(!anim.is_running());
    }

    #[test]
    fn test_blur_radius_rounds() {
        let mut scene = Scene::new();
        let node = scene.create_blur(0);
        NodeProperty::BlurRadius.set(&mut scene, node, 2.6);
        assert_eq!(scene.blur(node).radius, 3);
    }
}
