/// Time-driven fade ramp
///
/// A ramp is advanced by the frame delta; progress is `elapsed / duration`
/// and the value is linearly interpolated between the endpoints.

/// Linear volume ramp
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeRamp {
    from: f32,
    to: f32,

    /// Total duration in seconds
    duration: f32,

    elapsed: f32,
}

impl FadeRamp {
    /// Create a new ramp. Non-positive durations complete on the first step.
    pub fn new(from: f32, to: f32, duration: f32) -> Self {
        Self {
            from,
            to,
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            elapsed: 0.0,
        }
    }

    /// Create a ramp from `from` down to silence
    pub fn fade_out(from: f32, duration: f32) -> Self {
        Self::new(from, 0.0, duration)
    }

    /// Create a ramp from silence up to `to`
    pub fn fade_in(to: f32, duration: f32) -> Self {
        Self::new(0.0, to, duration)
    }

    /// Advance by `dt` seconds and return the new value
    pub fn step(&mut self, dt: f32) -> f32 {
        if dt.is_finite() && dt > 0.0 {
            self.elapsed = (self.elapsed + dt).min(self.duration);
        }
        self.value()
    }

    /// Fraction of the ramp completed, in [0, 1]
    pub fn progress(&self) -> f32 {
        if self.duration <= 0.0 {
            1.0
        } else {
            (self.elapsed / self.duration).clamp(0.0, 1.0)
        }
    }

    /// Current interpolated value
    pub fn value(&self) -> f32 {
        self.from + (self.to - self.from) * self.progress()
    }

    pub fn is_complete(&self) -> bool {
        self.progress() >= 1.0
    }

    pub fn target(&self) -> f32 {
        self.to
    }

    /// Move the end point, keeping progress
    pub fn retarget(&mut self, to: f32) {
        self.to = to;
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }
}
