/// Audio effects module
///
/// Value shaping used by the playback core: fade ramps, clamped volume
/// levels and exponential easing toward a moving target.

pub mod fade;
pub mod volume;

pub use fade::FadeRamp;
pub use volume::{clamp_volume, VolumeLevel};

/// Ease `current` toward `target` at `rate` per second.
///
/// Exponential approach: frame-rate independent, never overshoots, and a
/// non-positive rate holds the current value.
pub fn approach(current: f32, target: f32, rate: f32, dt: f32) -> f32 {
    if !target.is_finite() {
        return current;
    }
    if rate <= 0.0 || dt <= 0.0 {
        return current;
    }
    let blend = 1.0 - (-rate * dt).exp();
    current + (target - current) * blend
}

/// Linear interpolation with `t` clamped to [0, 1]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t.clamp(0.0, 1.0)
}
