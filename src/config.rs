use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;

use crate::audio_system::adaptive::AdaptiveConfig;
use crate::audio_system::category::{AudioCategory, CategoryArray, CategoryMix};
use crate::audio_system::effects::{clamp_volume, VolumeLevel};
use crate::audio_system::spatial::{FalloffCurve, RolloffMode};
use crate::error::ConfigError;

/// Output quality tier. Only changes the backend sample rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum QualityTier {
    Low,
    Medium,
    #[default]
    High,
}

impl QualityTier {
    pub fn sample_rate(self) -> u32 {
        match self {
            QualityTier::Low => 22_050,
            QualityTier::Medium => 44_100,
            QualityTier::High => 48_000,
        }
    }

    /// Stable name used by the settings store
    pub fn as_str(self) -> &'static str {
        match self {
            QualityTier::Low => "low",
            QualityTier::Medium => "medium",
            QualityTier::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(QualityTier::Low),
            "medium" => Some(QualityTier::Medium),
            "high" => Some(QualityTier::High),
            _ => None,
        }
    }
}

impl fmt::Display for QualityTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({} Hz)", self.as_str(), self.sample_rate())
    }
}

/// Defaults for one category
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    pub volume: f32,
    #[serde(default = "default_pitch")]
    pub pitch: f32,
    #[serde(default)]
    pub muted: bool,
    #[serde(default)]
    pub spatial: bool,
    /// Growth bound for this category's pool
    pub pool_size: usize,
}

fn default_pitch() -> f32 {
    1.0
}

impl CategoryConfig {
    pub fn defaults_for(category: AudioCategory) -> Self {
        Self {
            volume: category.default_volume(),
            pitch: 1.0,
            muted: false,
            spatial: category.default_spatial(),
            pool_size: category.default_pool_size(),
        }
    }

    pub fn to_mix(self) -> CategoryMix {
        let mut volume = VolumeLevel::new(self.volume);
        volume.set_muted(self.muted);
        CategoryMix {
            volume,
            pitch: if self.pitch.is_finite() && self.pitch > 0.0 {
                self.pitch
            } else {
                1.0
            },
            spatial: self.spatial,
        }
    }
}

/// 3D settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialConfig {
    pub doppler_level: f32,
    pub rolloff: RolloffMode,
    pub min_distance: f32,
    pub max_distance: f32,
    /// `[normalized_distance, multiplier]` key points
    pub falloff_curve: FalloffCurve,
}

impl Default for SpatialConfig {
    fn default() -> Self {
        Self {
            doppler_level: 1.0,
            rolloff: RolloffMode::Logarithmic,
            min_distance: 1.0,
            max_distance: 50.0,
            falloff_curve: FalloffCurve::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Channels allowed across every category
    pub max_channels: usize,

    /// Per-category overrides; missing categories use their defaults
    pub categories: BTreeMap<AudioCategory, CategoryConfig>,

    /// Master volume at startup
    pub master_volume: f32,

    /// Seconds for a music crossfade, also the default stop fade
    pub crossfade_duration: f32,

    /// Extra seconds after a clip ends before its channel is returned
    pub event_release_padding: f32,

    pub spatial: SpatialConfig,

    pub quality: QualityTier,

    pub adaptive: AdaptiveConfig,

    /// Fixed seed for clip/volume/pitch variation; random when absent
    pub rng_seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_channels: 32,
            categories: BTreeMap::new(),
            master_volume: 1.0,
            crossfade_duration: 2.0,
            event_release_padding: 0.1,
            spatial: SpatialConfig::default(),
            quality: QualityTier::default(),
            adaptive: AdaptiveConfig::default(),
            rng_seed: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::LoadFailed {
            path: path.display().to_string(),
            source: Box::new(e),
        })?;
        let config: EngineConfig =
            serde_json::from_str(&content).map_err(|e| ConfigError::LoadFailed {
                path: path.display().to_string(),
                source: Box::new(e),
            })?;

        tracing::info!("Loaded engine config from: {}", path.display());
        Ok(config)
    }

    /// Save configuration to disk
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let save_failed = |source: Box<dyn std::error::Error + Send + Sync>| ConfigError::SaveFailed {
            path: path.display().to_string(),
            source,
        };

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| save_failed(Box::new(e)))?;
        }

        let json = serde_json::to_string_pretty(self).map_err(|e| save_failed(Box::new(e)))?;
        fs::write(path, json).map_err(|e| save_failed(Box::new(e)))?;
        Ok(())
    }

    /// Effective settings for `category`
    pub fn category(&self, category: AudioCategory) -> CategoryConfig {
        self.categories
            .get(&category)
            .copied()
            .unwrap_or_else(|| CategoryConfig::defaults_for(category))
    }

    /// Builder-style override for one category
    pub fn with_category(mut self, category: AudioCategory, config: CategoryConfig) -> Self {
        self.categories.insert(category, config);
        self
    }

    /// Builder-style override of one category's pool size
    pub fn with_pool_size(mut self, category: AudioCategory, pool_size: usize) -> Self {
        let mut config = self.category(category);
        config.pool_size = pool_size;
        self.categories.insert(category, config);
        self
    }

    pub fn pool_capacities(&self) -> CategoryArray<usize> {
        CategoryArray::from_fn(|category| self.category(category).pool_size)
    }

    pub fn category_mixes(&self) -> CategoryArray<CategoryMix> {
        CategoryArray::from_fn(|category| self.category(category).to_mix())
    }

    /// Reject structurally unusable configs and clamp the rest
    pub fn validate(&mut self) -> Result<(), ConfigError> {
        if self.max_channels < 2 {
            return Err(ConfigError::Invalid(format!(
                "max_channels must be at least 2 (got {})",
                self.max_channels
            )));
        }
        if self.category(AudioCategory::Music).pool_size < 2 {
            return Err(ConfigError::Invalid(
                "music pool_size must be at least 2".to_string(),
            ));
        }

        let master = clamp_volume(self.master_volume, 1.0);
        if master != self.master_volume {
            tracing::warn!("master_volume {} clamped to {}", self.master_volume, master);
            self.master_volume = master;
        }
        if !self.crossfade_duration.is_finite() || self.crossfade_duration < 0.0 {
            tracing::warn!("crossfade_duration {} reset to 0", self.crossfade_duration);
            self.crossfade_duration = 0.0;
        }
        if !self.event_release_padding.is_finite() || self.event_release_padding < 0.0 {
            tracing::warn!(
                "event_release_padding {} reset to 0",
                self.event_release_padding
            );
            self.event_release_padding = 0.0;
        }
        for (category, config) in self.categories.iter_mut() {
            let volume = clamp_volume(config.volume, 1.0);
            if volume != config.volume {
                tracing::warn!("{} volume {} clamped to {}", category, config.volume, volume);
                config.volume = volume;
            }
        }
        if self.spatial.max_distance < self.spatial.min_distance {
            tracing::warn!("spatial max_distance below min_distance, swapping");
            std::mem::swap(&mut self.spatial.min_distance, &mut self.spatial.max_distance);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.max_channels, 32);
        assert_eq!(config.crossfade_duration, 2.0);
        assert_eq!(config.quality, QualityTier::High);
        assert_eq!(config.category(AudioCategory::Music).pool_size, 2);
    }

    #[test]
    fn test_config_serialization() {
        let config = EngineConfig::default().with_pool_size(AudioCategory::WorldSfx, 2);
        let json = serde_json::to_string(&config).unwrap();
        let deserialized: EngineConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
        assert_eq!(deserialized.category(AudioCategory::WorldSfx).pool_size, 2);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "max_channels": 12, "categories": { "UiSfx": { "volume": 0.5, "pool_size": 1 } } }"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.max_channels, 12);
        assert_eq!(config.category(AudioCategory::UiSfx).pool_size, 1);
        assert_eq!(config.category(AudioCategory::UiSfx).pitch, 1.0);
        assert_eq!(config.crossfade_duration, 2.0);
    }

    #[test]
    fn test_validate_rejects_small_music_pool() {
        let mut config = EngineConfig::default().with_pool_size(AudioCategory::Music, 1);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_clamps_volumes() {
        let mut config = EngineConfig {
            master_volume: 3.0,
            ..EngineConfig::default()
        };
        let mut voice = CategoryConfig::defaults_for(AudioCategory::Voice);
        voice.volume = -2.0;
        config = config.with_category(AudioCategory::Voice, voice);

        config.validate().unwrap();
        assert_eq!(config.master_volume, 1.0);
        assert_eq!(config.category(AudioCategory::Voice).volume, 0.0);
    }

    #[test]
    fn test_quality_names_round_trip() {
        for tier in [QualityTier::Low, QualityTier::Medium, QualityTier::High] {
            assert_eq!(QualityTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(QualityTier::parse("ultra"), None);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("engine.json");
        let config = EngineConfig {
            rng_seed: Some(7),
            ..EngineConfig::default()
        };

        config.save(&path).unwrap();
        let loaded = EngineConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
