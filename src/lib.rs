pub mod audio_system;
pub mod config;
pub mod error;
pub mod messaging;
pub mod music;
pub mod settings;

pub use audio_system::{
    AnchorId, AssetSource, AudioCatalog, AudioCategory, AudioClip, AudioEngine, AudioEvent,
    ClipLibrary, GameSignal, GameSnapshot, GameStateProbe, SceneFeed, SceneSnapshot, Vec3,
};
pub use config::{EngineConfig, QualityTier};
pub use error::{AppResult, AudioError, CatalogError, ConfigError, EngineError, SettingsError};
pub use messaging::{AudioNotification, EventBus};
pub use music::{MusicLayer, MusicState};
pub use settings::{AudioSettings, JsonFileStore, KeyValueStore, MemoryStore, StoredSettings};
