/// Audio clips and the asset lookup seam
///
/// The engine never decodes audio. A host hands it clips by name through
/// [`AssetSource`]; a clip carries its duration (used for completion timing)
/// and the encoded bytes a backend may decode.
use std::collections::HashMap;
use std::sync::Arc;

/// Handle to a playable asset
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    name: Arc<str>,

    /// Length in seconds
    duration: f32,

    /// Encoded audio, shared between every channel playing it
    data: Arc<Vec<u8>>,
}

impl AudioClip {
    pub fn new(name: impl Into<Arc<str>>, duration: f32, data: Arc<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            duration: if duration.is_finite() { duration.max(0.0) } else { 0.0 },
            data,
        }
    }

    /// A clip with timing only, for hosts whose backend resolves data itself
    pub fn silent(name: impl Into<Arc<str>>, duration: f32) -> Self {
        Self::new(name, duration, Arc::new(Vec::new()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn duration(&self) -> f32 {
        self.duration
    }

    pub fn data(&self) -> &Arc<Vec<u8>> {
        &self.data
    }
}

/// Source of raw playable assets by name
pub trait AssetSource {
    /// Look up a clip; `None` means not found
    fn resolve(&self, name: &str) -> Option<AudioClip>;
}

/// In-memory clip table
#[derive(Debug, Clone, Default)]
pub struct ClipLibrary {
    clips: HashMap<String, AudioClip>,
}

impl ClipLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a clip under its own name, replacing any previous entry
    pub fn insert(&mut self, clip: AudioClip) {
        tracing::debug!("Clip ready: {} ({:.2}s)", clip.name(), clip.duration());
        self.clips.insert(clip.name().to_string(), clip);
    }

    /// Builder form of [`ClipLibrary::insert`]
    pub fn with_clip(mut self, clip: AudioClip) -> Self {
        self.insert(clip);
        self
    }

    pub fn remove(&mut self, name: &str) -> Option<AudioClip> {
        self.clips.remove(name)
    }

    pub fn len(&self) -> usize {
        self.clips.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clips.is_empty()
    }
}

impl AssetSource for ClipLibrary {
    fn resolve(&self, name: &str) -> Option<AudioClip> {
        self.clips.get(name).cloned()
    }
}
