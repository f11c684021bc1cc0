/// Spatial tracking for positioned channels
///
/// Each frame the tracker drops channels that stopped, follows emitters that
/// are attached to a moving anchor, and writes a gain made of two layers:
/// the physical rolloff between the min and max distance, and a designer
/// falloff curve over the normalized distance `distance / max_distance`.
use std::collections::HashMap;
use std::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

use super::channel::ChannelHandle;
use super::pool::ChannelPool;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(self, other: Vec3) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Vec3;

    fn sub(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

/// Identifier of a moving game object a sound can be attached to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AnchorId(pub u64);

/// Per-frame position feed supplied by the host
pub trait SceneFeed {
    fn listener_position(&self) -> Vec3;

    /// Current world position of an anchor, `None` once it no longer exists
    fn anchor_position(&self, _anchor: AnchorId) -> Option<Vec3> {
        None
    }
}

/// Plain snapshot implementation of [`SceneFeed`]
#[derive(Debug, Clone, Default)]
pub struct SceneSnapshot {
    pub listener: Vec3,
    pub anchors: HashMap<AnchorId, Vec3>,
}

impl SceneSnapshot {
    pub fn at(listener: Vec3) -> Self {
        Self {
            listener,
            anchors: HashMap::new(),
        }
    }

    pub fn with_anchor(mut self, anchor: AnchorId, position: Vec3) -> Self {
        self.anchors.insert(anchor, position);
        self
    }
}

impl SceneFeed for SceneSnapshot {
    fn listener_position(&self) -> Vec3 {
        self.listener
    }

    fn anchor_position(&self, anchor: AnchorId) -> Option<Vec3> {
        self.anchors.get(&anchor).copied()
    }
}

/// Falloff distances made usable: `min >= 0`, `max >= min`, non-finite
/// values collapse onto the other bound
pub fn clamp_distances(min_distance: f32, max_distance: f32) -> (f32, f32) {
    let min = if min_distance.is_finite() {
        min_distance.max(0.0)
    } else {
        0.0
    };
    let max = if max_distance.is_finite() {
        max_distance.max(min)
    } else {
        min
    };
    (min, max)
}

/// Physical distance attenuation model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RolloffMode {
    /// Leave attenuation to the backend
    None,
    /// Straight line from full volume at min distance to silence at max
    Linear,
    /// `min / distance`, held constant past max distance
    #[default]
    Logarithmic,
}

impl RolloffMode {
    /// Attenuation factor (0.0-1.0) at `distance`
    pub fn attenuation(self, distance: f32, min_distance: f32, max_distance: f32) -> f32 {
        let (min_distance, max_distance) = clamp_distances(min_distance, max_distance);
        let d = if distance.is_nan() {
            0.0
        } else {
            distance.clamp(0.0, max_distance)
        };
        if d <= min_distance {
            return 1.0;
        }
        match self {
            RolloffMode::None => 1.0,
            RolloffMode::Linear => {
                let range = max_distance - min_distance;
                if range > 0.0 {
                    (1.0 - (d - min_distance) / range).clamp(0.0, 1.0)
                } else {
                    1.0
                }
            }
            RolloffMode::Logarithmic => {
                if d > 0.0 {
                    (min_distance.max(f32::EPSILON) / d).clamp(0.0, 1.0)
                } else {
                    1.0
                }
            }
        }
    }
}

/// Piecewise-linear curve mapping normalized distance to a gain multiplier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<[f32; 2]>", into = "Vec<[f32; 2]>")]
pub struct FalloffCurve {
    points: Vec<[f32; 2]>,
}

impl FalloffCurve {
    /// Build from `[normalized_distance, multiplier]` key points in any order
    pub fn new(mut points: Vec<[f32; 2]>) -> Self {
        points.retain(|p| p[0].is_finite() && p[1].is_finite());
        for p in points.iter_mut() {
            p[0] = p[0].clamp(0.0, 1.0);
            p[1] = p[1].clamp(0.0, 1.0);
        }
        points.sort_by(|a, b| a[0].total_cmp(&b[0]));
        Self { points }
    }

    /// Curve that never attenuates
    pub fn flat() -> Self {
        Self::new(vec![[0.0, 1.0], [1.0, 1.0]])
    }

    pub fn evaluate(&self, t: f32) -> f32 {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 1.0,
        };
        if t <= first[0] {
            return first[1];
        }
        if t >= last[0] {
            return last[1];
        }
        for pair in self.points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            if t <= b[0] {
                let span = b[0] - a[0];
                if span <= 0.0 {
                    return b[1];
                }
                return a[1] + (b[1] - a[1]) * ((t - a[0]) / span);
            }
        }
        last[1]
    }
}

impl Default for FalloffCurve {
    fn default() -> Self {
        Self::new(vec![
            [0.0, 1.0],
            [0.25, 0.9],
            [0.5, 0.6],
            [0.75, 0.25],
            [1.0, 0.0],
        ])
    }
}

impl From<Vec<[f32; 2]>> for FalloffCurve {
    fn from(points: Vec<[f32; 2]>) -> Self {
        Self::new(points)
    }
}

impl From<FalloffCurve> for Vec<[f32; 2]> {
    fn from(curve: FalloffCurve) -> Self {
        curve.points
    }
}

#[derive(Debug, Clone, Copy)]
struct SpatialEntry {
    handle: ChannelHandle,
    anchor: Option<AnchorId>,
    /// Offset from the anchor, or the fixed world position without one
    offset: Vec3,
}

/// Registry of channels currently playing positioned audio
#[derive(Debug, Clone)]
pub struct SpatialTracker {
    entries: Vec<SpatialEntry>,
    rolloff: RolloffMode,
    curve: FalloffCurve,
    doppler_level: f32,
    /// Falloff range for events that do not set their own
    default_distances: (f32, f32),
    /// Listener position seen on the last update
    listener: Vec3,
}

impl SpatialTracker {
    pub fn new(rolloff: RolloffMode, curve: FalloffCurve, doppler_level: f32) -> Self {
        Self {
            entries: Vec::new(),
            rolloff,
            curve,
            doppler_level,
            default_distances: (1.0, 50.0),
            listener: Vec3::ZERO,
        }
    }

    /// Falloff range used when an event leaves its distances unset
    pub fn with_default_distances(mut self, min_distance: f32, max_distance: f32) -> Self {
        self.default_distances = clamp_distances(min_distance, max_distance);
        self
    }

    /// An event's falloff range, unset ends taken from the defaults
    pub fn resolve_distances(&self, min_distance: Option<f32>, max_distance: Option<f32>) -> (f32, f32) {
        let (default_min, default_max) = self.default_distances;
        clamp_distances(
            min_distance.unwrap_or(default_min),
            max_distance.unwrap_or(default_max),
        )
    }

    pub fn listener(&self) -> Vec3 {
        self.listener
    }

    pub fn doppler_level(&self) -> f32 {
        self.doppler_level
    }

    /// Register a positioned channel; re-tracking the same handle replaces it
    pub fn track(&mut self, handle: ChannelHandle, position: Vec3, anchor: Option<AnchorId>) {
        self.untrack(handle);
        self.entries.push(SpatialEntry {
            handle,
            anchor,
            offset: position,
        });
    }

    pub fn untrack(&mut self, handle: ChannelHandle) {
        self.entries.retain(|e| e.handle != handle);
    }

    pub fn contains(&self, handle: ChannelHandle) -> bool {
        self.entries.iter().any(|e| e.handle == handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Gain for a source `distance` away with the given range
    pub fn gain_at(&self, distance: f32, min_distance: f32, max_distance: f32) -> f32 {
        let (min_distance, max_distance) = clamp_distances(min_distance, max_distance);
        let physical = self.rolloff.attenuation(distance, min_distance, max_distance);
        let normalized = if max_distance > 0.0 {
            distance / max_distance
        } else {
            1.0
        };
        physical * self.curve.evaluate(normalized)
    }

    /// Per-frame maintenance
    pub fn update(&mut self, pool: &mut ChannelPool, scene: &dyn SceneFeed) {
        let listener = scene.listener_position();
        self.listener = listener;
        pool.backend_mut().set_listener(listener);

        self.entries.retain(|entry| {
            pool.channel(entry.handle)
                .map(|c| c.is_playing() && c.is_spatial())
                .unwrap_or(false)
        });

        for entry in &self.entries {
            // A vanished anchor leaves the emitter at its last known position
            let position = match entry.anchor {
                Some(anchor) => scene.anchor_position(anchor).map(|base| base + entry.offset),
                None => Some(entry.offset),
            };

            let Some(channel) = pool.channel_mut(entry.handle) else {
                continue;
            };
            if let Some(position) = position {
                channel.set_position(position, self.doppler_level);
            }
            let Some(placement) = channel.spatial().copied() else {
                continue;
            };
            let distance = placement.position.distance(listener);
            let gain = self.gain_at(distance, placement.min_distance, placement.max_distance);
            channel.set_spatial_gain(gain);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::backend::SilentBackend;
    use crate::audio_system::category::{AudioCategory, CategoryArray};
    use crate::audio_system::clip::AudioClip;

    fn pool() -> ChannelPool {
        ChannelPool::new(Box::new(SilentBackend::new()), 16, CategoryArray::from_fn(|_| 4))
    }

    fn spatial_channel(pool: &mut ChannelPool, position: Vec3, duration: f32) -> ChannelHandle {
        let handle = pool.acquire(AudioCategory::WorldSfx).unwrap();
        let channel = pool.channel_mut(handle).unwrap();
        channel.set_3d(position, 1.0, 20.0, 0.0);
        channel.play(AudioClip::silent("boom", duration), false);
        handle
    }

    #[test]
    fn test_linear_rolloff() {
        let mode = RolloffMode::Linear;
        assert_eq!(mode.attenuation(0.5, 1.0, 11.0), 1.0);
        assert!((mode.attenuation(6.0, 1.0, 11.0) - 0.5).abs() < 1e-6);
        assert_eq!(mode.attenuation(50.0, 1.0, 11.0), 0.0);
    }

    #[test]
    fn test_logarithmic_rolloff_holds_past_max() {
        let mode = RolloffMode::Logarithmic;
        assert!((mode.attenuation(4.0, 1.0, 10.0) - 0.25).abs() < 1e-6);
        assert_eq!(mode.attenuation(100.0, 1.0, 10.0), mode.attenuation(10.0, 1.0, 10.0));
    }

    #[test]
    fn test_inverted_or_negative_distances_do_not_panic() {
        for mode in [RolloffMode::Linear, RolloffMode::Logarithmic, RolloffMode::None] {
            let gain = mode.attenuation(3.0, -2.0, -1.0);
            assert!((0.0..=1.0).contains(&gain));
            let gain = mode.attenuation(f32::NAN, 5.0, f32::INFINITY);
            assert!((0.0..=1.0).contains(&gain));
        }
        assert_eq!(clamp_distances(-2.0, -1.0), (0.0, 0.0));
        assert_eq!(clamp_distances(8.0, 2.0), (8.0, 8.0));
        assert_eq!(clamp_distances(f32::NAN, 20.0), (0.0, 20.0));

        let tracker = SpatialTracker::new(RolloffMode::Linear, FalloffCurve::flat(), 0.0);
        let gain = tracker.gain_at(3.0, -2.0, -1.0);
        assert!((0.0..=1.0).contains(&gain));
    }

    #[test]
    fn test_unset_distances_use_tracker_defaults() {
        let tracker = SpatialTracker::new(RolloffMode::Linear, FalloffCurve::flat(), 0.0)
            .with_default_distances(2.0, 80.0);
        assert_eq!(tracker.resolve_distances(None, None), (2.0, 80.0));
        assert_eq!(tracker.resolve_distances(Some(0.5), None), (0.5, 80.0));
        assert_eq!(tracker.resolve_distances(Some(-3.0), Some(-1.0)), (0.0, 0.0));
        assert_eq!(tracker.resolve_distances(Some(100.0), None), (100.0, 100.0));
    }

    #[test]
    fn test_curve_interpolates_between_points() {
        let curve = FalloffCurve::new(vec![[1.0, 0.0], [0.0, 1.0]]);
        assert_eq!(curve.evaluate(0.0), 1.0);
        assert!((curve.evaluate(0.25) - 0.75).abs() < 1e-6);
        assert_eq!(curve.evaluate(2.0), 0.0);
        assert_eq!(curve.evaluate(f32::NAN), 1.0);
    }

    #[test]
    fn test_empty_curve_is_neutral() {
        let curve = FalloffCurve::new(Vec::new());
        assert_eq!(curve.evaluate(0.7), 1.0);
    }

    #[test]
    fn test_curve_serde_as_point_list() {
        let curve: FalloffCurve = serde_json::from_str("[[0.0, 1.0], [1.0, 0.5]]").unwrap();
        assert!((curve.evaluate(0.5) - 0.75).abs() < 1e-6);
        let json = serde_json::to_string(&curve).unwrap();
        assert_eq!(json, "[[0.0,1.0],[1.0,0.5]]");
    }

    #[test]
    fn test_update_drops_finished_channels() {
        let mut pool = pool();
        let mut tracker = SpatialTracker::new(RolloffMode::Linear, FalloffCurve::flat(), 0.0);
        let short = spatial_channel(&mut pool, Vec3::new(2.0, 0.0, 0.0), 0.1);
        let long = spatial_channel(&mut pool, Vec3::new(2.0, 0.0, 0.0), 5.0);
        tracker.track(short, Vec3::new(2.0, 0.0, 0.0), None);
        tracker.track(long, Vec3::new(2.0, 0.0, 0.0), None);

        pool.advance(0.5);
        tracker.update(&mut pool, &SceneSnapshot::at(Vec3::ZERO));

        assert!(!tracker.contains(short));
        assert!(tracker.contains(long));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_update_applies_distance_gain() {
        let mut pool = pool();
        let mut tracker = SpatialTracker::new(RolloffMode::Linear, FalloffCurve::flat(), 0.0);
        let near = spatial_channel(&mut pool, Vec3::ZERO, 5.0);
        let far = spatial_channel(&mut pool, Vec3::ZERO, 5.0);
        tracker.track(near, Vec3::new(0.5, 0.0, 0.0), None);
        tracker.track(far, Vec3::new(0.0, 0.0, 10.5), None);

        tracker.update(&mut pool, &SceneSnapshot::at(Vec3::ZERO));

        assert_eq!(pool.channel(near).unwrap().spatial_gain(), 1.0);
        let far_gain = pool.channel(far).unwrap().spatial_gain();
        assert!((far_gain - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_anchored_emitter_follows_anchor() {
        let mut pool = pool();
        let mut tracker = SpatialTracker::new(RolloffMode::Linear, FalloffCurve::flat(), 0.0);
        let handle = spatial_channel(&mut pool, Vec3::ZERO, 5.0);
        let anchor = AnchorId(7);
        tracker.track(handle, Vec3::new(0.0, 1.0, 0.0), Some(anchor));

        let scene = SceneSnapshot::at(Vec3::ZERO).with_anchor(anchor, Vec3::new(3.0, 0.0, 0.0));
        tracker.update(&mut pool, &scene);
        let position = pool.channel(handle).unwrap().spatial().unwrap().position;
        assert_eq!(position, Vec3::new(3.0, 1.0, 0.0));

        // Anchor destroyed: the emitter stays where it was last seen
        tracker.update(&mut pool, &SceneSnapshot::at(Vec3::ZERO));
        let position = pool.channel(handle).unwrap().spatial().unwrap().position;
        assert_eq!(position, Vec3::new(3.0, 1.0, 0.0));
    }

    #[test]
    fn test_released_channel_leaves_registry() {
        let mut pool = pool();
        let mut tracker = SpatialTracker::new(RolloffMode::None, FalloffCurve::flat(), 0.0);
        let handle = spatial_channel(&mut pool, Vec3::ZERO, 5.0);
        tracker.track(handle, Vec3::ZERO, None);

        pool.release(handle);
        tracker.update(&mut pool, &SceneSnapshot::default());
        assert!(tracker.is_empty());
    }
}
