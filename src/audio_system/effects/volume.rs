/// Volume level with mute
///
/// Every write clamps into [0, 1]; NaN writes are ignored.

/// Clamped volume level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeLevel {
    /// Volume multiplier (0.0-1.0)
    level: f32,

    muted: bool,
}

/// Clamp a volume into [0, 1], mapping NaN to `fallback`
pub fn clamp_volume(value: f32, fallback: f32) -> f32 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 1.0)
    }
}

impl VolumeLevel {
    /// Create a new volume level
    pub fn new(level: f32) -> Self {
        Self {
            level: clamp_volume(level, 1.0),
            muted: false,
        }
    }

    /// Get the stored level (ignores mute)
    pub fn level(&self) -> f32 {
        self.level
    }

    /// Level actually heard: zero while muted
    pub fn effective(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.level
        }
    }

    /// Set the volume level
    pub fn set_level(&mut self, level: f32) {
        self.level = clamp_volume(level, self.level);
    }

    /// Check if muted
    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }
}

impl Default for VolumeLevel {
    fn default() -> Self {
        Self {
            level: 1.0,
            muted: false,
        }
    }
}
