/// Audio engine
///
/// Owns every subsystem and drives them from one per-frame `update`.
/// Single-threaded: the host calls everything from its game loop.
///
/// Tick order:
///
/// ```text
/// clock -> channel clocks -> due completions -> spatial -> music fades
///       -> adaptive knobs (music playing only) -> bus gains to voices
/// ```
use super::adaptive::{AdaptiveModulator, GameStateProbe, MusicModulation};
use super::backend::{AudioBackend, SilentBackend};
use super::catalog::AudioCatalog;
use super::category::{AudioCategory, CategoryArray, CategoryMix};
use super::channel::{ChannelHandle, PlaybackChannel};
use super::clip::AssetSource;
use super::dispatcher::{DispatchContext, EventDispatcher, PlayRequest};
use super::effects::clamp_volume;
use super::event::AudioEvent;
use super::pool::{ChannelPool, PoolStats};
use super::scheduler::{ScheduledTask, Scheduler};
use super::spatial::{AnchorId, SceneFeed, SpatialTracker, Vec3};
use crate::config::{EngineConfig, QualityTier};
use crate::error::{EngineError, SettingsError};
use crate::messaging::{AudioNotification, EventBus, SubscriberId};
use crate::music::{MusicLayer, MusicState, MusicStateMachine};
use crate::settings::{AudioSettings, KeyValueStore, StoredSettings};

use crossbeam_channel::Receiver;

/// Point-in-time view of the engine for debugging overlays and tests
#[derive(Debug, Clone, PartialEq)]
pub struct EngineDiagnostics {
    pub now: f64,
    pub total_channels: usize,
    pub max_channels: usize,
    pub pools: CategoryArray<PoolStats>,
    pub spatial_sources: usize,
    pub pending_completions: usize,
    pub music_state: MusicState,
    pub current_track: Option<String>,
}

pub struct AudioEngine {
    config: EngineConfig,
    pool: ChannelPool,
    assets: Box<dyn AssetSource>,
    dispatcher: EventDispatcher,
    music: MusicStateMachine,
    modulator: AdaptiveModulator,
    spatial: SpatialTracker,
    scheduler: Scheduler,
    categories: CategoryArray<CategoryMix>,
    master: f32,
    quality: QualityTier,
    bus: EventBus,
    now: f64,
    shut_down: bool,
}

impl AudioEngine {
    /// Build an engine. Fails only on a structurally unusable config.
    pub fn new(
        mut config: EngineConfig,
        backend: Box<dyn AudioBackend>,
        assets: Box<dyn AssetSource>,
    ) -> Result<Self, EngineError> {
        config.validate()?;

        let mut pool = ChannelPool::new(backend, config.max_channels, config.pool_capacities());
        pool.backend_mut()
            .set_sample_rate(config.quality.sample_rate());

        let categories = config.category_mixes();
        let music = MusicStateMachine::new(
            &mut pool,
            config.crossfade_duration,
            categories[AudioCategory::Music].volume.level(),
        )?;
        let spatial = SpatialTracker::new(
            config.spatial.rolloff,
            config.spatial.falloff_curve.clone(),
            config.spatial.doppler_level,
        )
        .with_default_distances(config.spatial.min_distance, config.spatial.max_distance);

        tracing::info!(
            "Audio engine ready: {} channels max, quality {}",
            config.max_channels,
            config.quality
        );

        Ok(Self {
            dispatcher: EventDispatcher::new(config.rng_seed, config.event_release_padding),
            modulator: AdaptiveModulator::new(config.adaptive.clone()),
            master: config.master_volume,
            quality: config.quality,
            config,
            pool,
            assets,
            music,
            spatial,
            scheduler: Scheduler::new(),
            categories,
            bus: EventBus::new(),
            now: 0.0,
            shut_down: false,
        })
    }

    /// Engine rendering through [`SilentBackend`]
    pub fn silent(config: EngineConfig, assets: Box<dyn AssetSource>) -> Result<Self, EngineError> {
        Self::new(config, Box::new(SilentBackend::new()), assets)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Engine time in seconds
    pub fn now(&self) -> f64 {
        self.now
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn subscribe(&self) -> (Receiver<AudioNotification>, SubscriberId) {
        self.bus.subscribe()
    }

    /// Subscribe to the notifications `accepts` returns true for
    pub fn subscribe_filtered(
        &self,
        accepts: impl Fn(&AudioNotification) -> bool + Send + Sync + 'static,
    ) -> (Receiver<AudioNotification>, SubscriberId) {
        self.bus.subscribe_filtered(accepts)
    }

    // ---- Registration ----

    pub fn register_event(&mut self, event: AudioEvent) {
        self.dispatcher.register(event);
    }

    pub fn register_music_layer(&mut self, layer: MusicLayer) {
        self.music.register_layer(layer);
    }

    pub fn load_catalog(&mut self, catalog: AudioCatalog) {
        for event in catalog.events {
            self.dispatcher.register(event);
        }
        for layer in catalog.music {
            self.music.register_layer(layer);
        }
    }

    // ---- Events ----

    /// Fire a named event. `position` is a world position, or an offset
    /// from `parent` when one is given. Returns `None` if the request was
    /// dropped for any reason.
    pub fn play_event(
        &mut self,
        name: &str,
        position: Option<Vec3>,
        parent: Option<AnchorId>,
    ) -> Option<ChannelHandle> {
        if self.shut_down {
            tracing::debug!("Engine shut down, ignoring event {}", name);
            return None;
        }

        let handle = self.dispatcher.play(
            name,
            PlayRequest {
                position,
                anchor: parent,
            },
            DispatchContext {
                now: self.now,
                pool: &mut self.pool,
                assets: self.assets.as_ref(),
                spatial: &mut self.spatial,
                scheduler: &mut self.scheduler,
                categories: &self.categories,
            },
        )?;

        // Anchored sounds learn their position on the next update
        if parent.is_none() {
            let (gain, pitch) = self.bus_level(handle.category());
            if let Some(channel) = self.pool.channel_mut(handle) {
                channel.apply_output(gain, pitch);
            }
        }

        self.bus.publish(AudioNotification::EventPlayed {
            name: name.to_string(),
            position,
        });
        Some(handle)
    }

    pub fn active_event_count(&self, name: &str) -> u32 {
        self.dispatcher.active_instances(name)
    }

    /// Read-only view of a lent channel; `None` once the handle is stale
    pub fn channel(&self, handle: ChannelHandle) -> Option<&PlaybackChannel> {
        self.pool.channel(handle)
    }

    // ---- Music ----

    /// Run a music operation and publish whatever it changed
    fn with_music<R>(&mut self, f: impl FnOnce(&mut MusicStateMachine, &mut ChannelPool) -> R) -> R {
        let old_state = self.music.state();
        let result = f(&mut self.music, &mut self.pool);
        self.publish_music_changes(old_state);
        result
    }

    pub fn play_track(&mut self, name: &str, crossfade: bool) -> bool {
        if self.shut_down {
            return false;
        }
        let assets = self.assets.as_ref();
        let old_state = self.music.state();
        let started = self
            .music
            .play_track(name, crossfade, &mut self.pool, assets);
        self.publish_music_changes(old_state);
        started
    }

    fn publish_music_changes(&mut self, old_state: MusicState) {
        for notification in self.music.take_notifications() {
            self.bus.publish(notification);
        }
        let new_state = self.music.state();
        if old_state != new_state {
            self.bus.publish(AudioNotification::MusicStateChanged {
                old_state,
                new_state,
            });
        }
    }

    /// Fade music out over `fade_time`, or the crossfade duration
    pub fn stop_music(&mut self, fade_time: Option<f32>) {
        self.with_music(|music, pool| music.stop_music(fade_time, pool));
    }

    pub fn pause_music(&mut self) -> bool {
        self.with_music(|music, pool| music.pause(pool))
    }

    pub fn resume_music(&mut self) -> bool {
        self.with_music(|music, pool| music.resume(pool))
    }

    pub fn music_state(&self) -> MusicState {
        self.music.state()
    }

    pub fn current_track(&self) -> Option<&str> {
        self.music.current_track()
    }

    /// Channel currently carrying the audible track
    pub fn music_channel(&self) -> Option<&PlaybackChannel> {
        self.pool.channel(self.music.active_handle())
    }

    // ---- Mixing ----

    pub fn master_volume(&self) -> f32 {
        self.master
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        let volume = clamp_volume(volume, self.master);
        self.master = volume;
        self.bus
            .publish(AudioNotification::MasterVolumeChanged { volume });
        self.push_outputs();
    }

    pub fn music_volume(&self) -> f32 {
        self.music.music_volume()
    }

    /// Music volume is baked into the track's target, so changing it
    /// retargets the playing track instead of the bus
    pub fn set_music_volume(&mut self, volume: f32) {
        self.categories[AudioCategory::Music]
            .volume
            .set_level(volume);
        let volume = self.categories[AudioCategory::Music].volume.level();
        self.music.set_music_volume(volume, &mut self.pool);
        self.bus.publish(AudioNotification::CategoryVolumeChanged {
            category: AudioCategory::Music,
            volume,
        });
        self.push_outputs();
    }

    pub fn sfx_volume(&self) -> f32 {
        self.categories[AudioCategory::PlayerSfx].volume.level()
    }

    /// One setting for every sound-effect category
    pub fn set_sfx_volume(&mut self, volume: f32) {
        for category in AudioCategory::ALL {
            if category.is_sfx() {
                self.set_bus_volume(category, volume);
            }
        }
        self.push_outputs();
    }

    pub fn voice_volume(&self) -> f32 {
        self.categories[AudioCategory::Voice].volume.level()
    }

    pub fn set_voice_volume(&mut self, volume: f32) {
        self.set_category_volume(AudioCategory::Voice, volume);
    }

    pub fn category_volume(&self, category: AudioCategory) -> f32 {
        if category == AudioCategory::Music {
            return self.music.music_volume();
        }
        self.categories[category].volume.level()
    }

    pub fn set_category_volume(&mut self, category: AudioCategory, volume: f32) {
        if category == AudioCategory::Music {
            self.set_music_volume(volume);
            return;
        }
        self.set_bus_volume(category, volume);
        self.push_outputs();
    }

    fn set_bus_volume(&mut self, category: AudioCategory, volume: f32) {
        let level = &mut self.categories[category].volume;
        level.set_level(volume);
        let volume = level.level();
        self.bus
            .publish(AudioNotification::CategoryVolumeChanged { category, volume });
    }

    pub fn is_category_muted(&self, category: AudioCategory) -> bool {
        self.categories[category].volume.is_muted()
    }

    pub fn set_category_muted(&mut self, category: AudioCategory, muted: bool) {
        self.categories[category].volume.set_muted(muted);
        tracing::debug!("{} {}", category, if muted { "muted" } else { "unmuted" });
        self.push_outputs();
    }

    pub fn quality(&self) -> QualityTier {
        self.quality
    }

    pub fn set_quality(&mut self, quality: QualityTier) {
        self.quality = quality;
        self.pool
            .backend_mut()
            .set_sample_rate(quality.sample_rate());
        tracing::info!("Output quality set to {}", quality);
        self.bus
            .publish(AudioNotification::QualityChanged { quality });
    }

    /// Gain and pitch applied to every channel of `category`
    fn bus_level(&self, category: AudioCategory) -> (f32, f32) {
        let mix = &self.categories[category];
        let gain = match category {
            // Music volume already lives in the track's target volume
            AudioCategory::Music => {
                if mix.volume.is_muted() {
                    0.0
                } else {
                    self.master
                }
            }
            AudioCategory::Ambient => {
                self.master * mix.volume.effective() * self.modulator.knobs().ambient_scale
            }
            _ => self.master * mix.volume.effective(),
        };
        (gain, mix.pitch)
    }

    fn push_outputs(&mut self) {
        let levels = CategoryArray::from_fn(|category| self.bus_level(category));
        self.pool.apply_outputs(|category| levels[category]);
    }

    // ---- Adaptive ----

    /// Write an adaptive parameter directly, clamped to 0-1; NaN is ignored
    pub fn set_adaptive_param(&mut self, name: &str, value: f32) -> bool {
        self.modulator.set_param(name, value)
    }

    pub fn adaptive_param(&self, name: &str) -> Option<f32> {
        self.modulator.param(name)
    }

    pub fn modulation(&self) -> MusicModulation {
        self.modulator.knobs()
    }

    // ---- Tick ----

    /// Advance the engine by `dt` seconds
    pub fn update(&mut self, dt: f32, scene: &dyn SceneFeed, game: &dyn GameStateProbe) {
        if self.shut_down {
            return;
        }
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };
        self.now += f64::from(dt);

        self.pool.advance(dt);

        for task in self.scheduler.drain_due(self.now) {
            match task {
                ScheduledTask::EventFinished { event, handle } => {
                    self.dispatcher
                        .finish(&event, handle, &mut self.pool, &mut self.spatial);
                }
            }
        }

        self.spatial.update(&mut self.pool, scene);

        self.with_music(|music, pool| music.update(dt, pool));

        if self.music.state().is_playing() && self.modulator.is_enabled() {
            let modulation = self.modulator.update(dt, game);
            self.music.apply_modulation(modulation, &mut self.pool);
        }

        self.push_outputs();
    }

    // ---- Stopping ----

    /// Silence one category. Music stops immediately; other channels go back
    /// to the pool and their pending completions only settle the counters.
    pub fn stop_category(&mut self, category: AudioCategory) {
        if category == AudioCategory::Music {
            self.stop_music(Some(0.0));
            return;
        }
        for handle in self.pool.active_handles(category) {
            self.spatial.untrack(handle);
            self.pool.release(handle);
        }
        tracing::debug!("Stopped all {} channels", category);
    }

    /// Stop every sound; music fades out over its layer's fade-out time
    pub fn stop_all(&mut self) {
        let fade = self
            .music
            .current_layer()
            .map(|layer| layer.fade_out)
            .unwrap_or(0.0);
        self.stop_music(Some(fade));
        for category in AudioCategory::ALL {
            if category != AudioCategory::Music {
                self.stop_category(category);
            }
        }
        tracing::info!("Stopped all audio");
    }

    /// Stop everything and return every channel. The engine ignores further
    /// playback requests.
    pub fn shutdown(&mut self) {
        if self.shut_down {
            return;
        }
        self.bus.publish(AudioNotification::Shutdown);
        self.music.release_channels(&mut self.pool);
        self.pool.release_all();
        self.scheduler.clear();
        self.spatial.clear();
        self.shut_down = true;
        tracing::info!("Audio engine shut down");
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down
    }

    // ---- Settings ----

    /// Persist the user-facing volume and quality settings
    pub fn save_settings(&self, store: &mut dyn KeyValueStore) -> Result<(), SettingsError> {
        AudioSettings::capture(self).save_to(store)
    }

    /// Read saved settings and apply the keys present through the normal
    /// setters; anything the store lacks keeps its current value
    pub fn load_settings(&mut self, store: &dyn KeyValueStore) -> Result<StoredSettings, SettingsError> {
        let stored = StoredSettings::load_from(store)?;
        stored.apply(self);
        Ok(stored)
    }

    // ---- Diagnostics ----

    pub fn pool_stats(&self, category: AudioCategory) -> PoolStats {
        self.pool.stats(category)
    }

    pub fn total_channels(&self) -> usize {
        self.pool.total_channels()
    }

    pub fn spatial_count(&self) -> usize {
        self.spatial.len()
    }

    pub fn diagnostics(&self) -> EngineDiagnostics {
        EngineDiagnostics {
            now: self.now,
            total_channels: self.pool.total_channels(),
            max_channels: self.pool.max_channels(),
            pools: CategoryArray::from_fn(|category| self.pool.stats(category)),
            spatial_sources: self.spatial.len(),
            pending_completions: self.scheduler.len(),
            music_state: self.music.state(),
            current_track: self.music.current_track().map(str::to_string),
        }
    }
}
