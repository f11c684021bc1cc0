/// rodio output backend
///
/// One `Sink` per voice on a shared output stream. Clips are decoded from
/// their in-memory bytes on every play. Sinks are 2D: distance shaping
/// arrives through the gain computed by the spatial tracker.
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

use rodio::{Decoder, OutputStream, OutputStreamHandle, Sink, Source};

use super::backend::{AudioBackend, Voice};
use super::category::AudioCategory;
use super::clip::AudioClip;
use crate::error::AudioError;

/// Backend rendering through the default output device
pub struct RodioBackend {
    _stream: OutputStream,
    stream_handle: OutputStreamHandle,
}

impl RodioBackend {
    /// Open the default output device
    pub fn new() -> Result<Self, AudioError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| AudioError::StreamInitFailed(Box::new(e)))?;
        tracing::info!("Opened default audio output stream");
        Ok(Self {
            _stream: stream,
            stream_handle,
        })
    }
}

/// Read and probe an audio file into a clip named `name`
///
/// The duration comes from the container when it reports one, otherwise
/// from counting decoded samples.
pub fn load_clip(name: &str, path: &Path) -> Result<AudioClip, AudioError> {
    let data = std::fs::read(path).map_err(|source| AudioError::ReadFailed {
        path: path.display().to_string(),
        source,
    })?;
    let data = Arc::new(data);
    let probe = AudioClip::new(name, 0.0, Arc::clone(&data));
    let decoder = RodioVoice::decode(&probe)?;

    let duration = match decoder.total_duration() {
        Some(duration) => duration.as_secs_f32(),
        None => {
            let rate = decoder.sample_rate().max(1) as f32;
            let channels = f32::from(decoder.channels().max(1));
            decoder.count() as f32 / (rate * channels)
        }
    };

    tracing::info!(
        "Loaded clip {}: {} ({:.2}s, {} bytes)",
        name,
        path.display(),
        duration,
        data.len()
    );
    Ok(AudioClip::new(name, duration, data))
}

impl AudioBackend for RodioBackend {
    fn create_voice(&mut self, category: AudioCategory) -> Box<dyn Voice> {
        Box::new(RodioVoice {
            category,
            stream_handle: self.stream_handle.clone(),
            sink: None,
            volume: 1.0,
            pitch: 1.0,
        })
    }

    fn set_sample_rate(&mut self, sample_rate: u32) {
        // The default stream negotiates its own rate; sources are resampled by rodio
        tracing::debug!("rodio backend keeps device rate (requested {} Hz)", sample_rate);
    }
}

struct RodioVoice {
    category: AudioCategory,
    stream_handle: OutputStreamHandle,
    sink: Option<Sink>,
    volume: f32,
    pitch: f32,
}

impl RodioVoice {
    fn decode(clip: &AudioClip) -> Result<Decoder<Cursor<Vec<u8>>>, AudioError> {
        // rodio's Decoder requires owned data with 'static lifetime
        let cursor = Cursor::new((**clip.data()).clone());
        Decoder::new(cursor).map_err(|e| AudioError::DecodeFailed {
            name: clip.name().to_string(),
            source: Box::new(e),
        })
    }
}

impl Voice for RodioVoice {
    fn play(&mut self, clip: &AudioClip, looping: bool) {
        // Stop any current audio and start from a fresh sink
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }

        let source = match Self::decode(clip) {
            Ok(source) => source,
            Err(e) => {
                tracing::warn!("{} voice stays silent: {}", self.category, e);
                return;
            }
        };

        let sink = match Sink::try_new(&self.stream_handle) {
            Ok(sink) => sink,
            Err(e) => {
                tracing::warn!("{} voice could not open a sink: {}", self.category, e);
                return;
            }
        };

        sink.set_volume(self.volume);
        sink.set_speed(self.pitch);
        if looping {
            sink.append(source.repeat_infinite());
        } else {
            sink.append(source);
        }
        sink.play();
        self.sink = Some(sink);
    }

    fn stop(&mut self) {
        if let Some(sink) = self.sink.take() {
            sink.stop();
        }
    }

    fn pause(&mut self) {
        if let Some(sink) = &self.sink {
            sink.pause();
        }
    }

    fn resume(&mut self) {
        if let Some(sink) = &self.sink {
            sink.play();
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, 1.0);
        if let Some(sink) = &self.sink {
            sink.set_volume(self.volume);
        }
    }

    fn set_pitch(&mut self, pitch: f32) {
        self.pitch = pitch;
        if let Some(sink) = &self.sink {
            sink.set_speed(pitch);
        }
    }
}
