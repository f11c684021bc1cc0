/// Two-channel music player
///
/// Owns two reserved channels from the Music pool. At most one track is
/// audible outside a crossfade; during a crossfade the incoming track plays
/// on the standby channel and the two swap roles when it completes.
///
/// ```text
/// Stopped --play_track--> Fading ------------------> Playing
/// Playing --play_track(crossfade)--> CrossFading --> Playing
/// Playing --pause--> Paused --resume--> Playing
/// any     --stop_music--> Fading ------------------> Stopped
/// ```
use std::collections::HashMap;

use crate::audio_system::adaptive::MusicModulation;
use crate::audio_system::category::AudioCategory;
use crate::audio_system::channel::ChannelHandle;
use crate::audio_system::clip::AssetSource;
use crate::audio_system::effects::{clamp_volume, FadeRamp};
use crate::audio_system::pool::ChannelPool;
use crate::error::EngineError;
use crate::messaging::AudioNotification;

use super::layer::MusicLayer;
use super::state::MusicState;

/// Fade in flight; at most one at a time
#[derive(Debug, Clone, Copy)]
enum MusicTask {
    FadeIn(FadeRamp),
    FadeOut {
        active: FadeRamp,
        /// Incoming track of an interrupted crossfade
        standby: Option<FadeRamp>,
    },
    CrossFade {
        outgoing: FadeRamp,
        incoming: FadeRamp,
    },
}

pub struct MusicStateMachine {
    state: MusicState,
    active: ChannelHandle,
    standby: ChannelHandle,
    layers: HashMap<String, MusicLayer>,
    current: Option<String>,
    task: Option<MusicTask>,
    crossfade_duration: f32,
    music_volume: f32,
    modulation: MusicModulation,
    notifications: Vec<AudioNotification>,
}

impl MusicStateMachine {
    /// Take and reserve the two music channels
    pub fn new(
        pool: &mut ChannelPool,
        crossfade_duration: f32,
        music_volume: f32,
    ) -> Result<Self, EngineError> {
        let active = Self::reserve_channel(pool, 0)?;
        let standby = Self::reserve_channel(pool, 1)?;

        Ok(Self {
            state: MusicState::Stopped,
            active,
            standby,
            layers: HashMap::new(),
            current: None,
            task: None,
            crossfade_duration: crossfade_duration.max(0.0),
            music_volume: clamp_volume(music_volume, 1.0),
            modulation: MusicModulation::NEUTRAL,
            notifications: Vec::new(),
        })
    }

    fn reserve_channel(pool: &mut ChannelPool, index: usize) -> Result<ChannelHandle, EngineError> {
        let handle = pool
            .acquire(AudioCategory::Music)
            .ok_or(EngineError::MusicReservationFailed { index })?;
        pool.reserve(handle);
        Ok(handle)
    }

    pub fn state(&self) -> MusicState {
        self.state
    }

    pub fn current_track(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn current_layer(&self) -> Option<&MusicLayer> {
        self.current.as_deref().and_then(|name| self.layers.get(name))
    }

    pub fn active_handle(&self) -> ChannelHandle {
        self.active
    }

    pub fn standby_handle(&self) -> ChannelHandle {
        self.standby
    }

    pub fn music_volume(&self) -> f32 {
        self.music_volume
    }

    pub fn crossfade_duration(&self) -> f32 {
        self.crossfade_duration
    }

    pub fn register_layer(&mut self, layer: MusicLayer) {
        tracing::debug!("Registered music layer: {} -> {}", layer.name, layer.clip);
        self.layers.insert(layer.name.clone(), layer);
    }

    pub fn has_layer(&self, name: &str) -> bool {
        self.layers.contains_key(name)
    }

    /// Drain notifications raised since the last call
    pub fn take_notifications(&mut self) -> Vec<AudioNotification> {
        std::mem::take(&mut self.notifications)
    }

    /// Volume a layer settles at under the current settings and modulation
    fn target_volume(&self, layer: &MusicLayer) -> f32 {
        (layer.volume * self.music_volume * self.modulation.volume_scale).clamp(0.0, 1.0)
    }

    /// Switch to `name`. Returns false when the request was ignored.
    pub fn play_track(
        &mut self,
        name: &str,
        crossfade: bool,
        pool: &mut ChannelPool,
        assets: &dyn AssetSource,
    ) -> bool {
        if self.state.is_playing() && self.current.as_deref() == Some(name) {
            tracing::debug!("Music track {} already playing", name);
            return false;
        }
        let Some(layer) = self.layers.get(name).cloned() else {
            tracing::warn!("Music layer not found: {}", name);
            return false;
        };
        let Some(clip) = assets.resolve(&layer.clip) else {
            tracing::warn!("Music asset not found: {} (layer {})", layer.clip, name);
            return false;
        };

        self.task = None;
        let target = self.target_volume(&layer);
        let active_playing = pool.channel(self.active).is_some_and(|c| c.is_playing());

        if crossfade && active_playing {
            let from = pool.channel(self.active).map(|c| c.volume()).unwrap_or(0.0);
            if let Some(standby) = pool.channel_mut(self.standby) {
                standby.stop();
                standby.set_volume(0.0);
                standby.set_pitch(self.modulation.pitch);
                standby.play(clip, layer.looping);
            }
            self.task = Some(MusicTask::CrossFade {
                outgoing: FadeRamp::fade_out(from, self.crossfade_duration),
                incoming: FadeRamp::fade_in(target, self.crossfade_duration),
            });
            self.state = MusicState::CrossFading;
            tracing::info!(
                "Crossfading music to {} over {:.2}s",
                name,
                self.crossfade_duration
            );
        } else {
            if let Some(standby) = pool.channel_mut(self.standby) {
                standby.stop();
            }
            if let Some(active) = pool.channel_mut(self.active) {
                active.stop();
                active.set_volume(0.0);
                active.set_pitch(self.modulation.pitch);
                active.play(clip, layer.looping);
            }
            self.task = Some(MusicTask::FadeIn(FadeRamp::fade_in(target, layer.fade_in)));
            self.state = MusicState::Fading;
            self.notifications.push(AudioNotification::TrackChanged {
                name: name.to_string(),
            });
            tracing::info!("Fading in music {} over {:.2}s", name, layer.fade_in);
        }

        self.current = Some(name.to_string());
        // Zero-length fades settle immediately
        self.update(0.0, pool);
        true
    }

    /// Fade out and stop. `None` uses the crossfade duration.
    pub fn stop_music(&mut self, fade_time: Option<f32>, pool: &mut ChannelPool) {
        if self.state.is_stopped() {
            return;
        }
        let duration = fade_time.unwrap_or(self.crossfade_duration);

        let active_from = pool.channel(self.active).map(|c| c.volume()).unwrap_or(0.0);
        let standby = match self.task.take() {
            Some(MusicTask::CrossFade { .. }) => {
                let from = pool.channel(self.standby).map(|c| c.volume()).unwrap_or(0.0);
                Some(FadeRamp::fade_out(from, duration))
            }
            _ => None,
        };
        if standby.is_none() {
            if let Some(channel) = pool.channel_mut(self.standby) {
                channel.stop();
            }
        }

        self.task = Some(MusicTask::FadeOut {
            active: FadeRamp::fade_out(active_from, duration),
            standby,
        });
        self.state = MusicState::Fading;
        tracing::info!("Stopping music over {:.2}s", duration);
        self.update(0.0, pool);
    }

    pub fn pause(&mut self, pool: &mut ChannelPool) -> bool {
        if !self.state.is_playing() {
            return false;
        }
        if let Some(channel) = pool.channel_mut(self.active) {
            channel.pause();
        }
        self.state = MusicState::Paused;
        tracing::debug!("Music paused");
        true
    }

    pub fn resume(&mut self, pool: &mut ChannelPool) -> bool {
        if !self.state.is_paused() {
            return false;
        }
        if let Some(channel) = pool.channel_mut(self.active) {
            channel.resume();
        }
        self.state = MusicState::Playing;
        tracing::debug!("Music resumed");
        true
    }

    /// Change the music volume setting; in-flight fades head for the new level
    pub fn set_music_volume(&mut self, volume: f32, pool: &mut ChannelPool) {
        self.music_volume = clamp_volume(volume, self.music_volume);
        let Some(target) = self.current_layer().map(|layer| self.target_volume(layer)) else {
            return;
        };
        match self.task.as_mut() {
            Some(MusicTask::FadeIn(ramp)) => ramp.retarget(target),
            Some(MusicTask::CrossFade { incoming, .. }) => incoming.retarget(target),
            Some(MusicTask::FadeOut { .. }) => {}
            None => {
                if matches!(self.state, MusicState::Playing | MusicState::Paused) {
                    if let Some(channel) = pool.channel_mut(self.active) {
                        channel.set_volume(target);
                    }
                }
            }
        }
    }

    /// Apply adaptive knobs to the active channel. Only takes effect while
    /// playing.
    pub fn apply_modulation(&mut self, modulation: MusicModulation, pool: &mut ChannelPool) {
        if !self.state.is_playing() {
            return;
        }
        self.modulation = modulation;
        let Some(target) = self.current_layer().map(|layer| self.target_volume(layer)) else {
            return;
        };
        if let Some(channel) = pool.channel_mut(self.active) {
            channel.set_volume(target);
            channel.set_pitch(modulation.pitch);
        }
    }

    /// Advance the running fade by `dt`
    pub fn update(&mut self, dt: f32, pool: &mut ChannelPool) {
        if self.state.is_playing() && !pool.channel(self.active).is_some_and(|c| c.is_playing()) {
            // A non-looping layer ran out
            tracing::info!("Music track {:?} ended", self.current);
            self.current = None;
            self.state = MusicState::Stopped;
        }

        let Some(mut task) = self.task.take() else {
            return;
        };

        let finished = match &mut task {
            MusicTask::FadeIn(ramp) => {
                let volume = ramp.step(dt);
                if let Some(channel) = pool.channel_mut(self.active) {
                    channel.set_volume(volume);
                }
                ramp.is_complete()
            }
            MusicTask::FadeOut { active, standby } => {
                let volume = active.step(dt);
                if let Some(channel) = pool.channel_mut(self.active) {
                    channel.set_volume(volume);
                }
                let mut done = active.is_complete();
                if let Some(ramp) = standby.as_mut() {
                    let volume = ramp.step(dt);
                    if let Some(channel) = pool.channel_mut(self.standby) {
                        channel.set_volume(volume);
                    }
                    done &= ramp.is_complete();
                }
                done
            }
            MusicTask::CrossFade { outgoing, incoming } => {
                let out_volume = outgoing.step(dt);
                let in_volume = incoming.step(dt);
                if let Some(channel) = pool.channel_mut(self.active) {
                    channel.set_volume(out_volume);
                }
                if let Some(channel) = pool.channel_mut(self.standby) {
                    channel.set_volume(in_volume);
                }
                outgoing.is_complete() && incoming.is_complete()
            }
        };

        if !finished {
            self.task = Some(task);
            return;
        }

        match task {
            MusicTask::FadeIn(_) => {
                self.state = MusicState::Playing;
                tracing::debug!("Music fade-in complete");
            }
            MusicTask::FadeOut { .. } => {
                for handle in [self.active, self.standby] {
                    if let Some(channel) = pool.channel_mut(handle) {
                        channel.stop();
                        channel.set_volume(0.0);
                    }
                }
                self.current = None;
                self.state = MusicState::Stopped;
                tracing::info!("Music stopped");
            }
            MusicTask::CrossFade { .. } => {
                if let Some(channel) = pool.channel_mut(self.active) {
                    channel.stop();
                }
                std::mem::swap(&mut self.active, &mut self.standby);
                self.state = MusicState::Playing;
                if let Some(name) = self.current.clone() {
                    tracing::info!("Crossfade to {} complete", name);
                    self.notifications
                        .push(AudioNotification::TrackChanged { name });
                }
            }
        }
    }

    /// Stop both channels immediately and hand them back to the pool
    pub fn release_channels(&mut self, pool: &mut ChannelPool) {
        self.task = None;
        self.current = None;
        self.state = MusicState::Stopped;
        pool.release(self.active);
        pool.release(self.standby);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::backend::SilentBackend;
    use crate::audio_system::category::CategoryArray;
    use crate::audio_system::clip::{AudioClip, ClipLibrary};

    fn setup() -> (MusicStateMachine, ChannelPool, ClipLibrary) {
        let mut pool = ChannelPool::new(Box::new(SilentBackend::new()), 16, CategoryArray::from_fn(|_| 2));
        let mut music = MusicStateMachine::new(&mut pool, 2.0, 1.0).unwrap();
        music.register_layer(MusicLayer::new("explore", "explore_loop").with_fades(1.0, 1.0));
        music.register_layer(MusicLayer::new("combat", "combat_loop").with_fades(0.5, 0.5));
        let assets = ClipLibrary::new()
            .with_clip(AudioClip::silent("explore_loop", 30.0))
            .with_clip(AudioClip::silent("combat_loop", 30.0));
        (music, pool, assets)
    }

    fn run(music: &mut MusicStateMachine, pool: &mut ChannelPool, seconds: f32) {
        let steps = (seconds / 0.05).round() as usize;
        for _ in 0..steps {
            music.update(0.05, pool);
        }
    }

    #[test]
    fn test_reserves_two_music_channels() {
        let (music, pool, _) = setup();
        assert_eq!(pool.stats(AudioCategory::Music).active, 2);
        assert_ne!(music.active_handle(), music.standby_handle());
    }

    #[test]
    fn test_fade_in_reaches_playing() {
        let (mut music, mut pool, assets) = setup();
        assert!(music.play_track("explore", false, &mut pool, &assets));
        assert_eq!(music.state(), MusicState::Fading);
        assert_eq!(music.current_track(), Some("explore"));

        run(&mut music, &mut pool, 1.1);
        assert_eq!(music.state(), MusicState::Playing);
        let volume = pool.channel(music.active_handle()).unwrap().volume();
        assert!((volume - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_same_track_while_playing_is_ignored() {
        let (mut music, mut pool, assets) = setup();
        music.play_track("explore", false, &mut pool, &assets);
        run(&mut music, &mut pool, 1.1);
        music.take_notifications();

        assert!(!music.play_track("explore", true, &mut pool, &assets));
        assert_eq!(music.state(), MusicState::Playing);
        assert!(music.take_notifications().is_empty());
    }

    #[test]
    fn test_unknown_layer_changes_nothing() {
        let (mut music, mut pool, assets) = setup();
        assert!(!music.play_track("boss", true, &mut pool, &assets));
        assert_eq!(music.state(), MusicState::Stopped);
        assert_eq!(music.current_track(), None);
    }

    #[test]
    fn test_crossfade_swaps_channels() {
        let (mut music, mut pool, assets) = setup();
        music.play_track("explore", false, &mut pool, &assets);
        run(&mut music, &mut pool, 1.1);
        let first = music.active_handle();
        music.take_notifications();

        assert!(music.play_track("combat", true, &mut pool, &assets));
        assert_eq!(music.state(), MusicState::CrossFading);
        run(&mut music, &mut pool, 1.0);
        let a = pool.channel(music.active_handle()).unwrap().volume();
        let b = pool.channel(music.standby_handle()).unwrap().volume();
        assert!((a - 0.5).abs() < 1e-3 && (b - 0.5).abs() < 1e-3);

        run(&mut music, &mut pool, 1.1);
        assert_eq!(music.state(), MusicState::Playing);
        assert_eq!(music.standby_handle(), first);
        assert!(!pool.channel(first).unwrap().is_playing());
        assert_eq!(
            music.take_notifications(),
            vec![AudioNotification::TrackChanged {
                name: "combat".to_string()
            }]
        );
    }

    #[test]
    fn test_stop_fades_to_stopped() {
        let (mut music, mut pool, assets) = setup();
        music.play_track("explore", false, &mut pool, &assets);
        run(&mut music, &mut pool, 1.1);

        music.stop_music(Some(0.5), &mut pool);
        assert_eq!(music.state(), MusicState::Fading);
        run(&mut music, &mut pool, 0.6);
        assert_eq!(music.state(), MusicState::Stopped);
        assert_eq!(music.current_track(), None);
        assert!(!pool.channel(music.active_handle()).unwrap().is_playing());
    }

    #[test]
    fn test_zero_fade_stops_synchronously() {
        let (mut music, mut pool, assets) = setup();
        music.play_track("explore", false, &mut pool, &assets);
        music.stop_music(Some(0.0), &mut pool);
        assert_eq!(music.state(), MusicState::Stopped);
    }

    #[test]
    fn test_stop_from_stopped_is_noop() {
        let (mut music, mut pool, _) = setup();
        music.stop_music(None, &mut pool);
        assert_eq!(music.state(), MusicState::Stopped);
    }

    #[test]
    fn test_pause_only_from_playing() {
        let (mut music, mut pool, assets) = setup();
        assert!(!music.pause(&mut pool));

        music.play_track("explore", false, &mut pool, &assets);
        assert!(!music.pause(&mut pool));
        run(&mut music, &mut pool, 1.1);

        assert!(music.pause(&mut pool));
        assert_eq!(music.state(), MusicState::Paused);
        assert!(!music.pause(&mut pool));
        assert!(music.resume(&mut pool));
        assert_eq!(music.state(), MusicState::Playing);
        assert!(!music.resume(&mut pool));
    }

    #[test]
    fn test_music_volume_retargets_playing_track() {
        let (mut music, mut pool, assets) = setup();
        music.play_track("explore", false, &mut pool, &assets);
        run(&mut music, &mut pool, 1.1);

        music.set_music_volume(0.4, &mut pool);
        let volume = pool.channel(music.active_handle()).unwrap().volume();
        assert!((volume - 0.4).abs() < 1e-6);
    }

    #[test]
    fn test_one_shot_layer_stops_at_end() {
        let (mut music, mut pool, mut assets) = setup();
        music.register_layer(MusicLayer::new("sting", "sting").with_looping(false).with_fades(0.0, 0.0));
        assets.insert(AudioClip::silent("sting", 1.0));

        music.play_track("sting", false, &mut pool, &assets);
        assert_eq!(music.state(), MusicState::Playing);
        pool.advance(1.5);
        music.update(0.0, &mut pool);
        assert_eq!(music.state(), MusicState::Stopped);
        assert_eq!(music.current_track(), None);
    }

    #[test]
    fn test_modulation_ignored_unless_playing() {
        let (mut music, mut pool, assets) = setup();
        music.play_track("explore", false, &mut pool, &assets);
        let quiet = MusicModulation {
            volume_scale: 0.5,
            pitch: 1.05,
            ambient_scale: 1.0,
        };

        music.apply_modulation(quiet, &mut pool);
        assert_eq!(pool.channel(music.active_handle()).unwrap().pitch(), 1.0);

        run(&mut music, &mut pool, 1.1);
        music.apply_modulation(quiet, &mut pool);
        let channel = pool.channel(music.active_handle()).unwrap();
        assert!((channel.volume() - 0.5).abs() < 1e-6);
        assert!((channel.pitch() - 1.05).abs() < 1e-6);
    }
}
