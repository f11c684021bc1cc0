/// User audio settings persistence
///
/// Saves and loads the four user-facing volumes and the quality tier
/// through a string key-value store. Loading goes through the engine's
/// normal setters, so a loaded value behaves exactly like one set at
/// runtime. Keys missing from the store leave the engine's value alone.
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::audio_system::manager::AudioEngine;
use crate::config::QualityTier;
use crate::error::SettingsError;

pub const KEY_VERSION: &str = "audio.version";
pub const KEY_MASTER: &str = "audio.master_volume";
pub const KEY_MUSIC: &str = "audio.music_volume";
pub const KEY_SFX: &str = "audio.sfx_volume";
pub const KEY_VOICE: &str = "audio.voice_volume";
pub const KEY_QUALITY: &str = "audio.quality";

/// String key-value storage supplied by the host
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&mut self, key: &str, value: String);

    /// Make previous writes durable
    fn flush(&mut self) -> Result<(), SettingsError> {
        Ok(())
    }
}

/// Store that lives only as long as the process
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }
}

/// Store backed by one pretty-printed JSON object on disk
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    values: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open `path`; a missing file starts empty
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SettingsError> {
        let path = path.into();
        if !path.exists() {
            tracing::debug!("No settings found at {}, starting fresh", path.display());
            return Ok(Self {
                path,
                values: BTreeMap::new(),
            });
        }

        let read_failed = |source: Box<dyn std::error::Error + Send + Sync>| SettingsError::ReadFailed {
            path: path.display().to_string(),
            source,
        };
        let json = fs::read_to_string(&path).map_err(|e| read_failed(Box::new(e)))?;
        let values = serde_json::from_str(&json).map_err(|e| read_failed(Box::new(e)))?;

        tracing::debug!("Loaded settings from: {}", path.display());
        Ok(Self { path, values })
    }

    /// Open the per-user settings file
    pub fn open_default() -> Result<Self, SettingsError> {
        let path = Self::default_path().ok_or(SettingsError::NoSettingsDir)?;
        Self::open(path)
    }

    /// `<config dir>/GameAudio/audio_settings.json`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("GameAudio").join("audio_settings.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.values.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: String) {
        self.values.insert(key.to_string(), value);
    }

    fn flush(&mut self) -> Result<(), SettingsError> {
        let write_failed = |source: Box<dyn std::error::Error + Send + Sync>| SettingsError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        };

        // Create parent directory if it doesn't exist
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| write_failed(Box::new(e)))?;
        }

        let json = serde_json::to_string_pretty(&self.values).map_err(|e| write_failed(Box::new(e)))?;
        fs::write(&self.path, json).map_err(|e| write_failed(Box::new(e)))?;

        tracing::debug!("Saved settings to: {}", self.path.display());
        Ok(())
    }
}

/// The persisted subset of the mix
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AudioSettings {
    pub master_volume: f32,
    pub music_volume: f32,
    pub sfx_volume: f32,
    pub voice_volume: f32,
    pub quality: QualityTier,
}

impl Default for AudioSettings {
    fn default() -> Self {
        Self {
            master_volume: 1.0,
            music_volume: 0.7,
            sfx_volume: 1.0,
            voice_volume: 1.0,
            quality: QualityTier::High,
        }
    }
}

impl AudioSettings {
    /// Current settings format
    const VERSION: u32 = 1;

    /// Read the values currently in effect on `engine`
    pub fn capture(engine: &AudioEngine) -> Self {
        Self {
            master_volume: engine.master_volume(),
            music_volume: engine.music_volume(),
            sfx_volume: engine.sfx_volume(),
            voice_volume: engine.voice_volume(),
            quality: engine.quality(),
        }
    }

    /// Apply through the engine's runtime setters
    pub fn apply(&self, engine: &mut AudioEngine) {
        engine.set_master_volume(self.master_volume);
        engine.set_music_volume(self.music_volume);
        engine.set_sfx_volume(self.sfx_volume);
        engine.set_voice_volume(self.voice_volume);
        engine.set_quality(self.quality);
    }

    pub fn save_to(&self, store: &mut dyn KeyValueStore) -> Result<(), SettingsError> {
        store.set(KEY_VERSION, Self::VERSION.to_string());
        store.set(KEY_MASTER, self.master_volume.to_string());
        store.set(KEY_MUSIC, self.music_volume.to_string());
        store.set(KEY_SFX, self.sfx_volume.to_string());
        store.set(KEY_VOICE, self.voice_volume.to_string());
        store.set(KEY_QUALITY, self.quality.as_str().to_string());
        store.flush()
    }
}

/// Settings as found in a store; keys never written stay `None`
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StoredSettings {
    pub master_volume: Option<f32>,
    pub music_volume: Option<f32>,
    pub sfx_volume: Option<f32>,
    pub voice_volume: Option<f32>,
    pub quality: Option<QualityTier>,
}

impl StoredSettings {
    pub fn load_from(store: &dyn KeyValueStore) -> Result<Self, SettingsError> {
        if let Some(version) = store.get(KEY_VERSION) {
            if version.trim() != AudioSettings::VERSION.to_string() {
                tracing::warn!(
                    "Settings version mismatch: expected {}, found {}",
                    AudioSettings::VERSION,
                    version
                );
            }
        }

        let quality = match store.get(KEY_QUALITY) {
            Some(value) => Some(QualityTier::parse(&value).ok_or_else(|| {
                SettingsError::Malformed {
                    key: KEY_QUALITY.to_string(),
                    value,
                }
            })?),
            None => None,
        };

        Ok(Self {
            master_volume: read_volume(store, KEY_MASTER)?,
            music_volume: read_volume(store, KEY_MUSIC)?,
            sfx_volume: read_volume(store, KEY_SFX)?,
            voice_volume: read_volume(store, KEY_VOICE)?,
            quality,
        })
    }

    /// Number of keys the store held
    pub fn len(&self) -> usize {
        [
            self.master_volume.is_some(),
            self.music_volume.is_some(),
            self.sfx_volume.is_some(),
            self.voice_volume.is_some(),
            self.quality.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `base` with every stored value laid over it
    pub fn resolve(&self, base: AudioSettings) -> AudioSettings {
        AudioSettings {
            master_volume: self.master_volume.unwrap_or(base.master_volume),
            music_volume: self.music_volume.unwrap_or(base.music_volume),
            sfx_volume: self.sfx_volume.unwrap_or(base.sfx_volume),
            voice_volume: self.voice_volume.unwrap_or(base.voice_volume),
            quality: self.quality.unwrap_or(base.quality),
        }
    }

    /// Apply the stored values only; the rest of the engine's mix is untouched
    pub fn apply(&self, engine: &mut AudioEngine) {
        if let Some(volume) = self.master_volume {
            engine.set_master_volume(volume);
        }
        if let Some(volume) = self.music_volume {
            engine.set_music_volume(volume);
        }
        if let Some(volume) = self.sfx_volume {
            engine.set_sfx_volume(volume);
        }
        if let Some(volume) = self.voice_volume {
            engine.set_voice_volume(volume);
        }
        if let Some(quality) = self.quality {
            engine.set_quality(quality);
        }
    }
}

fn read_volume(store: &dyn KeyValueStore, key: &str) -> Result<Option<f32>, SettingsError> {
    match store.get(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<f32>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Some)
            .ok_or(SettingsError::Malformed {
                key: key.to_string(),
                value,
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_round_trip() {
        let settings = AudioSettings {
            master_volume: 0.35,
            music_volume: 0.123_456_7,
            sfx_volume: 0.9,
            voice_volume: 0.0,
            quality: QualityTier::Medium,
        };
        let mut store = MemoryStore::new();
        settings.save_to(&mut store).unwrap();

        let stored = StoredSettings::load_from(&store).unwrap();
        assert_eq!(stored.len(), 5);
        assert_eq!(stored.resolve(AudioSettings::default()), settings);
    }

    #[test]
    fn test_missing_keys_stay_unset() {
        let stored = StoredSettings::load_from(&MemoryStore::new()).unwrap();
        assert!(stored.is_empty());

        let base = AudioSettings {
            master_volume: 0.5,
            quality: QualityTier::Low,
            ..AudioSettings::default()
        };
        assert_eq!(stored.resolve(base), base);
    }

    #[test]
    fn test_partial_store_overlays_base() {
        let mut store = MemoryStore::new();
        store.set(KEY_MUSIC, "0.25".to_string());

        let stored = StoredSettings::load_from(&store).unwrap();
        assert_eq!(stored.len(), 1);
        let resolved = stored.resolve(AudioSettings {
            master_volume: 0.5,
            ..AudioSettings::default()
        });
        assert_eq!(resolved.master_volume, 0.5);
        assert_eq!(resolved.music_volume, 0.25);
    }

    #[test]
    fn test_malformed_value_is_reported() {
        let mut store = MemoryStore::new();
        store.set(KEY_SFX, "loud".to_string());

        let err = StoredSettings::load_from(&store).unwrap_err();
        assert!(matches!(err, SettingsError::Malformed { ref key, .. } if key == KEY_SFX));
    }

    #[test]
    fn test_unknown_quality_is_reported() {
        let mut store = MemoryStore::new();
        store.set(KEY_QUALITY, "ultra".to_string());
        assert!(StoredSettings::load_from(&store).is_err());
    }

    #[test]
    fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings").join("audio.json");

        let mut store = JsonFileStore::open(&path).unwrap();
        store.set(KEY_MASTER, "0.5".to_string());
        store.flush().unwrap();

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(reopened.get(KEY_MASTER).as_deref(), Some("0.5"));
    }

    #[test]
    fn test_corrupt_file_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audio.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(SettingsError::ReadFailed { .. })
        ));
    }

    #[test]
    fn test_default_path() {
        if let Some(path) = JsonFileStore::default_path() {
            assert!(path.to_string_lossy().contains("GameAudio"));
            assert!(path.to_string_lossy().ends_with("audio_settings.json"));
        }
    }
}
