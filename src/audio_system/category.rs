/// Audio categories
///
/// Defines the closed set of channel partitions. Every category owns its own
/// pool slice and mix bus; categories never share channels.
use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

use super::effects::VolumeLevel;

/// Audio channel categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AudioCategory {
    /// Music tracks, driven by the music state machine
    Music,

    /// Sounds emitted by the player character
    PlayerSfx,

    /// Sounds emitted by the world (enemies, props, physics)
    WorldSfx,

    /// Interface feedback
    UiSfx,

    /// Dialogue and barks
    Voice,

    /// Environmental beds and one-shots
    Ambient,
}

impl fmt::Display for AudioCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AudioCategory::Music => write!(f, "Music"),
            AudioCategory::PlayerSfx => write!(f, "Player SFX"),
            AudioCategory::WorldSfx => write!(f, "World SFX"),
            AudioCategory::UiSfx => write!(f, "UI SFX"),
            AudioCategory::Voice => write!(f, "Voice"),
            AudioCategory::Ambient => write!(f, "Ambient"),
        }
    }
}

impl AudioCategory {
    /// Number of categories
    pub const COUNT: usize = 6;

    /// All categories in ordinal order
    pub const ALL: [AudioCategory; Self::COUNT] = [
        AudioCategory::Music,
        AudioCategory::PlayerSfx,
        AudioCategory::WorldSfx,
        AudioCategory::UiSfx,
        AudioCategory::Voice,
        AudioCategory::Ambient,
    ];

    /// Ordinal used to index fixed per-category storage
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Default bus volume
    pub fn default_volume(self) -> f32 {
        match self {
            AudioCategory::Music => 0.7,
            AudioCategory::PlayerSfx => 1.0,
            AudioCategory::WorldSfx => 0.9,
            AudioCategory::UiSfx => 0.8,
            AudioCategory::Voice => 1.0,
            AudioCategory::Ambient => 0.6,
        }
    }

    /// Whether events in this category are positioned by default
    pub fn default_spatial(self) -> bool {
        matches!(self, AudioCategory::WorldSfx | AudioCategory::Ambient)
    }

    /// Default growth bound for this category's pool
    pub fn default_pool_size(self) -> usize {
        match self {
            AudioCategory::Music => 2,
            AudioCategory::PlayerSfx => 8,
            AudioCategory::WorldSfx => 12,
            AudioCategory::UiSfx => 4,
            AudioCategory::Voice => 3,
            AudioCategory::Ambient => 3,
        }
    }

    /// Categories driven by the persisted "sfx" volume
    pub fn is_sfx(self) -> bool {
        matches!(
            self,
            AudioCategory::PlayerSfx
                | AudioCategory::WorldSfx
                | AudioCategory::UiSfx
                | AudioCategory::Ambient
        )
    }
}

/// Fixed-size storage with one slot per category
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryArray<T>([T; AudioCategory::COUNT]);

impl<T> CategoryArray<T> {
    /// Build every slot from its category
    pub fn from_fn(mut f: impl FnMut(AudioCategory) -> T) -> Self {
        Self(std::array::from_fn(|i| f(AudioCategory::ALL[i])))
    }

    pub fn iter(&self) -> impl Iterator<Item = (AudioCategory, &T)> {
        AudioCategory::ALL.into_iter().zip(self.0.iter())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (AudioCategory, &mut T)> {
        AudioCategory::ALL.into_iter().zip(self.0.iter_mut())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.0.iter()
    }
}

impl<T: Default> Default for CategoryArray<T> {
    fn default() -> Self {
        Self::from_fn(|_| T::default())
    }
}

impl<T> Index<AudioCategory> for CategoryArray<T> {
    type Output = T;

    fn index(&self, category: AudioCategory) -> &T {
        &self.0[category.index()]
    }
}

impl<T> IndexMut<AudioCategory> for CategoryArray<T> {
    fn index_mut(&mut self, category: AudioCategory) -> &mut T {
        &mut self.0[category.index()]
    }
}

/// Mix bus state for one category
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CategoryMix {
    /// Bus volume and mute
    pub volume: VolumeLevel,

    /// Pitch multiplier applied on top of each channel's own pitch
    pub pitch: f32,

    /// Whether events in this category default to 3D playback
    pub spatial: bool,
}

impl CategoryMix {
    pub fn for_category(category: AudioCategory) -> Self {
        Self {
            volume: VolumeLevel::new(category.default_volume()),
            pitch: 1.0,
            spatial: category.default_spatial(),
        }
    }
}
