/// Audio event definitions
///
/// An event is a named, designer-authored recipe for playing a sound:
/// a category, candidate clips, randomized volume and pitch, a cooldown
/// and a concurrency cap. Events are plain data; firing them is the
/// dispatcher's job.
use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

use super::category::AudioCategory;

/// Inclusive `[min, max]` range sampled uniformly on every play
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f32,
    pub max: f32,
}

impl ValueRange {
    pub const UNIT: ValueRange = ValueRange { min: 1.0, max: 1.0 };

    pub fn new(min: f32, max: f32) -> Self {
        Self { min, max }
    }

    /// Both bounds pulled into `[lo, hi]`; a NaN bound becomes 1.0 first
    pub fn clamped(self, lo: f32, hi: f32) -> Self {
        let bound = |v: f32| (if v.is_nan() { 1.0 } else { v }).clamp(lo, hi);
        Self {
            min: bound(self.min),
            max: bound(self.max),
        }
    }

    /// Uniform sample; collapses to `min` when the range is empty
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f32 {
        if !self.min.is_finite() {
            return if self.max.is_finite() { self.max } else { 1.0 };
        }
        if !self.max.is_finite() || self.max <= self.min {
            return self.min;
        }
        if (self.max - self.min).is_finite() {
            rng.gen_range(self.min..=self.max)
        } else {
            // Width overflows f32; interpolate in f64 instead
            let t: f64 = rng.gen();
            let value = self.min as f64 + (self.max as f64 - self.min as f64) * t;
            (value as f32).clamp(self.min, self.max)
        }
    }
}

impl Default for ValueRange {
    fn default() -> Self {
        Self::UNIT
    }
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioEvent {
    pub name: String,
    pub category: AudioCategory,

    /// Candidate asset names
    #[serde(default)]
    pub clips: Vec<String>,

    /// Pick a random candidate instead of the first
    #[serde(default = "default_true")]
    pub randomize_clip: bool,

    #[serde(default)]
    pub volume: ValueRange,

    #[serde(default)]
    pub pitch: ValueRange,

    /// Minimum seconds between two plays
    #[serde(default)]
    pub cooldown: f32,

    /// Instances allowed to play at once
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: u32,

    /// Overrides the category's spatial default
    #[serde(default)]
    pub spatial: Option<bool>,

    /// Falloff range; unset ends come from the spatial config
    #[serde(default)]
    pub min_distance: Option<f32>,

    #[serde(default)]
    pub max_distance: Option<f32>,
}

impl AudioEvent {
    pub fn new(name: impl Into<String>, category: AudioCategory) -> Self {
        Self {
            name: name.into(),
            category,
            clips: Vec::new(),
            randomize_clip: true,
            volume: ValueRange::UNIT,
            pitch: ValueRange::UNIT,
            cooldown: 0.0,
            max_concurrent: default_max_concurrent(),
            spatial: None,
            min_distance: None,
            max_distance: None,
        }
    }

    pub fn with_clip(mut self, clip: impl Into<String>) -> Self {
        self.clips.push(clip.into());
        self
    }

    pub fn with_volume(mut self, min: f32, max: f32) -> Self {
        self.volume = ValueRange::new(min, max);
        self
    }

    pub fn with_pitch(mut self, min: f32, max: f32) -> Self {
        self.pitch = ValueRange::new(min, max);
        self
    }

    pub fn with_cooldown(mut self, seconds: f32) -> Self {
        self.cooldown = seconds;
        self
    }

    pub fn with_max_concurrent(mut self, max: u32) -> Self {
        self.max_concurrent = max;
        self
    }

    pub fn with_spatial(mut self, spatial: bool) -> Self {
        self.spatial = Some(spatial);
        self
    }

    pub fn with_distances(mut self, min: f32, max: f32) -> Self {
        self.min_distance = Some(min);
        self.max_distance = Some(max);
        self
    }

    pub fn with_randomize_clip(mut self, randomize: bool) -> Self {
        self.randomize_clip = randomize;
        self
    }
}

/// Event table keyed by name
#[derive(Debug, Clone, Default)]
pub struct EventRegistry {
    events: HashMap<String, AudioEvent>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an event; returns the definition it replaced
    pub fn register(&mut self, event: AudioEvent) -> Option<AudioEvent> {
        tracing::debug!("Registered audio event: {} ({})", event.name, event.category);
        self.events.insert(event.name.clone(), event)
    }

    pub fn get(&self, name: &str) -> Option<&AudioEvent> {
        self.events.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.events.keys().map(String::as_str)
    }
}
