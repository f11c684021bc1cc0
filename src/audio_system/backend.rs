/// Mixing backend seam
///
/// The engine decides *what* plays and at which gain; a backend renders it.
/// Each playback channel owns one [`Voice`] for its whole life, the way a
/// player owns a sink.
use super::category::AudioCategory;
use super::clip::AudioClip;
use super::spatial::Vec3;

/// 3D parameters forwarded to a voice
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoiceSpatial {
    pub position: Vec3,
    pub min_distance: f32,
    pub max_distance: f32,
    pub doppler_level: f32,
}

/// One hardware/software voice
pub trait Voice {
    /// Start `clip` from the beginning, replacing anything queued
    fn play(&mut self, clip: &AudioClip, looping: bool);

    fn stop(&mut self);

    fn pause(&mut self);

    fn resume(&mut self);

    /// Final output gain, already combined with bus and spatial shaping
    fn set_volume(&mut self, volume: f32);

    fn set_pitch(&mut self, pitch: f32);

    /// `None` switches the voice to 2D
    fn set_spatial(&mut self, _spatial: Option<VoiceSpatial>) {}
}

/// Factory for voices plus output-wide settings
pub trait AudioBackend {
    fn create_voice(&mut self, category: AudioCategory) -> Box<dyn Voice>;

    fn set_sample_rate(&mut self, _sample_rate: u32) {}

    fn set_listener(&mut self, _position: Vec3) {}
}

/// Backend that renders nothing
///
/// Used headless and in tests; the engine's own clock decides when a
/// channel has finished.
#[derive(Debug, Default)]
pub struct SilentBackend {
    voices_created: usize,
    sample_rate: u32,
}

impl SilentBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn voices_created(&self) -> usize {
        self.voices_created
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

#[derive(Debug, Default)]
struct SilentVoice;

impl Voice for SilentVoice {
    fn play(&mut self, _clip: &AudioClip, _looping: bool) {}
    fn stop(&mut self) {}
    fn pause(&mut self) {}
    fn resume(&mut self) {}
    fn set_volume(&mut self, _volume: f32) {}
    fn set_pitch(&mut self, _pitch: f32) {}
}

impl AudioBackend for SilentBackend {
    fn create_voice(&mut self, _category: AudioCategory) -> Box<dyn Voice> {
        self.voices_created += 1;
        Box::new(SilentVoice)
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        self.sample_rate = sample_rate;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silent_backend_counts_voices() {
        let mut backend = SilentBackend::new();
        let mut voice = backend.create_voice(AudioCategory::UiSfx);
        voice.play(&AudioClip::silent("click", 0.1), false);
        voice.set_volume(0.5);
        voice.stop();

        let _second = backend.create_voice(AudioCategory::Music);
        assert_eq!(backend.voices_created(), 2);
    }

    #[test]
    fn test_silent_backend_records_sample_rate() {
        let mut backend = SilentBackend::new();
        backend.set_sample_rate(48_000);
        assert_eq!(backend.sample_rate(), 48_000);
    }
}
