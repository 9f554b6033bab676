//! Keyframe animation: clips, sampling and the mixer that plays them.
//!
//! A clip is a named set of channels. Each channel drives one property
//! (translation, rotation or scale) of one scene node through a list of
//! keyframes. The [`mixer::AnimationMixer`] owns the playback state and
//! writes sampled poses into a [`SceneGraph`](crate::data_structures::scene_graph::SceneGraph).

use cgmath::{InnerSpace, Quaternion, Vector3, Vector4, VectorSpace};

pub mod clock;
pub mod mixer;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Interpolation {
    #[default]
    Linear,
    Step,
    /// Outputs are stored as `[in_tangent, value, out_tangent]` triplets.
    CubicSpline,
}

impl From<gltf::animation::Interpolation> for Interpolation {
    fn from(value: gltf::animation::Interpolation) -> Self {
        match value {
            gltf::animation::Interpolation::Linear => Interpolation::Linear,
            gltf::animation::Interpolation::Step => Interpolation::Step,
            gltf::animation::Interpolation::CubicSpline => Interpolation::CubicSpline,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Keyframes {
    Translation(Vec<Vector3<f32>>),
    Rotation(Vec<Quaternion<f32>>),
    Scale(Vec<Vector3<f32>>),
    /// Morph target weights; recognised but not played.
    Other,
}

/// One sampled property value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Sample {
    Translation(Vector3<f32>),
    Rotation(Quaternion<f32>),
    Scale(Vector3<f32>),
}

#[derive(Clone, Debug)]
pub struct Channel {
    pub target_node: usize,
    pub interpolation: Interpolation,
    pub timestamps: Vec<f32>,
    pub keyframes: Keyframes,
}

impl Channel {
    /// Sample the channel at `time` seconds, clamping outside the keyframe range.
    pub fn sample(&self, time: f32) -> Option<Sample> {
        match &self.keyframes {
            Keyframes::Translation(values) => {
                sample_track(&self.timestamps, values, self.interpolation, time)
                    .map(Sample::Translation)
            }
            Keyframes::Rotation(values) => {
                sample_track(&self.timestamps, values, self.interpolation, time)
                    .map(|q| Sample::Rotation(q.normalize()))
            }
            Keyframes::Scale(values) => {
                sample_track(&self.timestamps, values, self.interpolation, time)
                    .map(Sample::Scale)
            }
            Keyframes::Other => None,
        }
    }

    pub fn end_time(&self) -> f32 {
        self.timestamps.last().copied().unwrap_or(0.0)
    }
}

/// A named animation as found in the model file.
#[derive(Clone, Debug)]
pub struct AnimationClip {
    pub name: String,
    pub channels: Vec<Channel>,
    pub duration: f32,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>, channels: Vec<Channel>) -> Self {
        let duration = channels
            .iter()
            .map(Channel::end_time)
            .fold(0.0_f32, f32::max);
        Self {
            name: name.into(),
            channels,
            duration,
        }
    }

    pub fn find_by_name<'a>(clips: &'a [AnimationClip], name: &str) -> Option<&'a AnimationClip> {
        clips.iter().find(|clip| clip.name == name)
    }

    /// Nodes touched by at least one playable channel.
    pub fn target_nodes(&self) -> impl Iterator<Item = usize> + '_ {
        self.channels
            .iter()
            .filter(|channel| !matches!(channel.keyframes, Keyframes::Other))
            .map(|channel| channel.target_node)
    }
}

trait Keyframe: Copy {
    fn lerp_to(self, other: Self, amount: f32) -> Self;
    fn hermite(v0: Self, out_tangent: Self, v1: Self, in_tangent: Self, dt: f32, t: f32) -> Self;
}

fn hermite_weights(t: f32) -> (f32, f32, f32, f32) {
    let t2 = t * t;
    let t3 = t2 * t;
    (
        2.0 * t3 - 3.0 * t2 + 1.0,
        t3 - 2.0 * t2 + t,
        -2.0 * t3 + 3.0 * t2,
        t3 - t2,
    )
}

impl Keyframe for Vector3<f32> {
    fn lerp_to(self, other: Self, amount: f32) -> Self {
        self.lerp(other, amount)
    }

    fn hermite(v0: Self, out_tangent: Self, v1: Self, in_tangent: Self, dt: f32, t: f32) -> Self {
        let (h00, h10, h01, h11) = hermite_weights(t);
        v0 * h00 + out_tangent * (h10 * dt) + v1 * h01 + in_tangent * (h11 * dt)
    }
}

impl Keyframe for Quaternion<f32> {
    fn lerp_to(self, other: Self, amount: f32) -> Self {
        self.slerp(other, amount)
    }

    fn hermite(v0: Self, out_tangent: Self, v1: Self, in_tangent: Self, dt: f32, t: f32) -> Self {
        let as_vec = |q: Quaternion<f32>| Vector4::new(q.v.x, q.v.y, q.v.z, q.s);
        let (h00, h10, h01, h11) = hermite_weights(t);
        let v = as_vec(v0) * h00
            + as_vec(out_tangent) * (h10 * dt)
            + as_vec(v1) * h01
            + as_vec(in_tangent) * (h11 * dt);
        Quaternion::new(v.w, v.x, v.y, v.z)
    }
}

fn sample_track<T: Keyframe>(
    timestamps: &[f32],
    values: &[T],
    interpolation: Interpolation,
    time: f32,
) -> Option<T> {
    let stride = match interpolation {
        Interpolation::CubicSpline => 3,
        _ => 1,
    };
    let count = timestamps.len().min(values.len() / stride);
    if count == 0 {
        return None;
    }
    let value = |k: usize| values[k * stride + stride / 2];

    let first = timestamps[0];
    let last = timestamps[count - 1];
    if count == 1 || time <= first {
        return Some(value(0));
    }
    if time >= last {
        return Some(value(count - 1));
    }

    // timestamps[k0] <= time < timestamps[k1]
    let k1 = timestamps[..count].partition_point(|&ts| ts <= time);
    let k0 = k1 - 1;
    let dt = timestamps[k1] - timestamps[k0];
    let t = if dt > 0.0 {
        (time - timestamps[k0]) / dt
    } else {
        0.0
    };

    Some(match interpolation {
        Interpolation::Step => value(k0),
        Interpolation::Linear => value(k0).lerp_to(value(k1), t),
        Interpolation::CubicSpline => T::hermite(
            value(k0),
            values[k0 * 3 + 2],
            value(k1),
            values[k1 * 3],
            dt,
            t,
        ),
    })
}
