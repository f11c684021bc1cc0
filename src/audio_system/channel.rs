/// Playback channel
///
/// A single reusable unit that renders one clip at a time. Channels are
/// created lazily by the pool, reused indefinitely and only dropped at
/// pool teardown.
use std::fmt;

use super::backend::{Voice, VoiceSpatial};
use super::category::AudioCategory;
use super::clip::AudioClip;
use super::effects::clamp_volume;
use super::spatial::{clamp_distances, Vec3};

pub const MIN_PITCH: f32 = 0.1;
pub const MAX_PITCH: f32 = 3.0;

/// Lent-out reference to a pooled channel.
///
/// The generation changes every time the channel is handed out again, so a
/// handle kept past its playback can never touch the next user's sound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelHandle {
    category: AudioCategory,
    slot: usize,
    generation: u32,
}

impl ChannelHandle {
    pub(crate) fn new(category: AudioCategory, slot: usize, generation: u32) -> Self {
        Self {
            category,
            slot,
            generation,
        }
    }

    pub fn category(&self) -> AudioCategory {
        self.category
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

/// 3D placement of a channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpatialPlacement {
    pub position: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
}

pub struct PlaybackChannel {
    category: AudioCategory,
    voice: Box<dyn Voice>,
    clip: Option<AudioClip>,
    volume: f32,
    pitch: f32,
    muted: bool,
    spatial: Option<SpatialPlacement>,

    /// Multiplier written by the spatial tracker
    spatial_gain: f32,

    /// Gain last pushed to the voice
    output_gain: f32,

    playing: bool,
    paused: bool,
    looping: bool,

    /// Seconds played since the last start
    cursor: f32,

    generation: u32,
    reserved: bool,
}

impl fmt::Debug for PlaybackChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackChannel")
            .field("category", &self.category)
            .field("clip", &self.clip.as_ref().map(|c| c.name().to_string()))
            .field("volume", &self.volume)
            .field("pitch", &self.pitch)
            .field("playing", &self.playing)
            .field("paused", &self.paused)
            .field("generation", &self.generation)
            .finish_non_exhaustive()
    }
}

impl PlaybackChannel {
    pub(crate) fn new(category: AudioCategory, voice: Box<dyn Voice>) -> Self {
        Self {
            category,
            voice,
            clip: None,
            volume: 1.0,
            pitch: 1.0,
            muted: false,
            spatial: None,
            spatial_gain: 1.0,
            output_gain: 0.0,
            playing: false,
            paused: false,
            looping: false,
            cursor: 0.0,
            generation: 0,
            reserved: false,
        }
    }

    pub fn category(&self) -> AudioCategory {
        self.category
    }

    pub fn clip(&self) -> Option<&AudioClip> {
        self.clip.as_ref()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    /// Set volume (0.0-1.0)
    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume, self.volume);
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }

    pub fn set_pitch(&mut self, pitch: f32) {
        if !pitch.is_nan() {
            self.pitch = pitch.clamp(MIN_PITCH, MAX_PITCH);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// True from `play` until the clip ends or the channel is stopped,
    /// including while paused
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_spatial(&self) -> bool {
        self.spatial.is_some()
    }

    pub fn spatial(&self) -> Option<&SpatialPlacement> {
        self.spatial.as_ref()
    }

    pub fn spatial_gain(&self) -> f32 {
        self.spatial_gain
    }

    pub fn output_gain(&self) -> f32 {
        self.output_gain
    }

    /// Seconds played since the last start
    pub fn cursor(&self) -> f32 {
        self.cursor
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    pub(crate) fn bump_generation(&mut self) -> u32 {
        self.generation = self.generation.wrapping_add(1);
        self.generation
    }

    pub(crate) fn is_reserved(&self) -> bool {
        self.reserved
    }

    pub(crate) fn set_reserved(&mut self, reserved: bool) {
        self.reserved = reserved;
    }

    /// Switch to 2D playback
    pub fn set_2d(&mut self) {
        self.spatial = None;
        self.spatial_gain = 1.0;
        self.voice.set_spatial(None);
    }

    /// Switch to 3D playback at `position`
    pub fn set_3d(&mut self, position: Vec3, min_distance: f32, max_distance: f32, doppler: f32) {
        let (min_distance, max_distance) = clamp_distances(min_distance, max_distance);
        self.spatial = Some(SpatialPlacement {
            position,
            min_distance,
            max_distance,
        });
        self.voice.set_spatial(Some(VoiceSpatial {
            position,
            min_distance,
            max_distance,
            doppler_level: doppler,
        }));
    }

    /// Move a 3D channel; 2D channels ignore this
    pub fn set_position(&mut self, position: Vec3, doppler: f32) {
        if let Some(placement) = self.spatial.as_mut() {
            placement.position = position;
            let placement = *placement;
            self.voice.set_spatial(Some(VoiceSpatial {
                position,
                min_distance: placement.min_distance,
                max_distance: placement.max_distance,
                doppler_level: doppler,
            }));
        }
    }

    pub(crate) fn set_spatial_gain(&mut self, gain: f32) {
        self.spatial_gain = clamp_volume(gain, self.spatial_gain);
    }

    /// Start `clip` from its beginning
    pub fn play(&mut self, clip: AudioClip, looping: bool) {
        self.voice.play(&clip, looping);
        self.clip = Some(clip);
        self.looping = looping;
        self.playing = true;
        self.paused = false;
        self.cursor = 0.0;
    }

    pub fn stop(&mut self) {
        if self.playing {
            self.voice.stop();
        }
        self.playing = false;
        self.paused = false;
    }

    pub fn pause(&mut self) {
        if self.playing && !self.paused {
            self.voice.pause();
            self.paused = true;
        }
    }

    pub fn resume(&mut self) {
        if self.playing && self.paused {
            self.voice.resume();
            self.paused = false;
        }
    }

    /// Stop and clear everything a previous user configured
    pub(crate) fn reset(&mut self) {
        self.stop();
        self.clip = None;
        self.volume = 1.0;
        self.pitch = 1.0;
        self.muted = false;
        self.looping = false;
        self.cursor = 0.0;
        self.set_2d();
        self.voice.set_volume(0.0);
        self.output_gain = 0.0;
    }

    /// Advance the playback clock. Returns true when the clip ran out on
    /// this step.
    pub(crate) fn advance(&mut self, dt: f32) -> bool {
        if !self.playing || self.paused || dt <= 0.0 {
            return false;
        }
        self.cursor += dt;
        let Some(duration) = self.clip.as_ref().map(AudioClip::duration) else {
            return false;
        };
        if self.looping {
            if duration > 0.0 {
                self.cursor %= duration;
            }
            return false;
        }
        if self.cursor >= duration {
            self.playing = false;
            self.voice.stop();
            return true;
        }
        false
    }

    /// Gain the voice should receive under a bus gain of `bus_gain`
    pub fn effective_gain(&self, bus_gain: f32) -> f32 {
        if self.muted {
            0.0
        } else {
            (self.volume * self.spatial_gain * bus_gain).clamp(0.0, 1.0)
        }
    }

    /// Push gain and pitch to the voice
    pub(crate) fn apply_output(&mut self, bus_gain: f32, bus_pitch: f32) {
        self.output_gain = self.effective_gain(bus_gain);
        self.voice.set_volume(self.output_gain);
        self.voice.set_pitch(self.pitch * bus_pitch);
    }
}
