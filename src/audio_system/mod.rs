/// Audio system module
///
/// The runtime core of the engine:
/// - Pooled playback channels per category, bounded by a global cap
/// - Named audio events with cooldowns, concurrency caps and variation
/// - 3D attenuation for positioned and anchored emitters
/// - Adaptive modulation of the music track from game state
///
/// ## Architecture
///
/// ```text
/// AudioEngine
///   ├── ChannelPool ─────────── one free/active list per AudioCategory
///   │     └── PlaybackChannel ─ Voice (backend)
///   ├── EventDispatcher ─────── EventRegistry + per-event runtime
///   ├── Scheduler ───────────── delayed completions
///   ├── SpatialTracker ──────── rolloff x falloff curve
///   ├── MusicStateMachine ───── two reserved Music channels
///   └── AdaptiveModulator ───── signals -> parameters -> knobs
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let mut engine = AudioEngine::silent(EngineConfig::default(), Box::new(clips))?;
/// engine.load_catalog(AudioCatalog::load(Path::new("catalog.json"))?);
///
/// engine.play_track("explore", false);
/// engine.play_event("explosion", Some(Vec3::new(4.0, 0.0, 2.0)), None);
///
/// // Once per frame
/// engine.update(dt, &scene, &game);
/// ```

pub mod adaptive;
pub mod backend;
pub mod catalog;
pub mod category;
pub mod channel;
pub mod clip;
pub mod dispatcher;
pub mod effects;
pub mod event;
pub mod manager;
pub mod pool;
#[cfg(feature = "rodio-backend")]
pub mod rodio_backend;
pub mod scheduler;
pub mod spatial;

// Re-export commonly used types
pub use adaptive::{AdaptiveConfig, GameSignal, GameSnapshot, GameStateProbe, MusicModulation};
pub use backend::{AudioBackend, SilentBackend, Voice};
pub use catalog::AudioCatalog;
pub use category::{AudioCategory, CategoryArray};
pub use channel::{ChannelHandle, PlaybackChannel};
pub use clip::{AssetSource, AudioClip, ClipLibrary};
pub use event::{AudioEvent, ValueRange};
pub use manager::{AudioEngine, EngineDiagnostics};
pub use pool::PoolStats;
#[cfg(feature = "rodio-backend")]
pub use rodio_backend::RodioBackend;
pub use spatial::{AnchorId, FalloffCurve, RolloffMode, SceneFeed, SceneSnapshot, Vec3};
