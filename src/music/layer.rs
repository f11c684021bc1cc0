use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

fn default_fade() -> f32 {
    1.0
}

fn default_volume() -> f32 {
    1.0
}

/// A named music track: which asset to stream and how to bring it in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicLayer {
    pub name: String,

    /// Asset name resolved through the engine's asset source
    pub clip: String,

    #[serde(default = "default_true")]
    pub looping: bool,

    /// Seconds to fade in when started without a crossfade
    #[serde(default = "default_fade")]
    pub fade_in: f32,

    /// Seconds to fade out when every sound is stopped at once
    #[serde(default = "default_fade")]
    pub fade_out: f32,

    /// Base volume before the music volume setting is applied
    #[serde(default = "default_volume")]
    pub volume: f32,
}

impl MusicLayer {
    pub fn new(name: impl Into<String>, clip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clip: clip.into(),
            looping: true,
            fade_in: default_fade(),
            fade_out: default_fade(),
            volume: default_volume(),
        }
    }

    pub fn with_fades(mut self, fade_in: f32, fade_out: f32) -> Self {
        self.fade_in = fade_in;
        self.fade_out = fade_out;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }

    pub fn with_looping(mut self, looping: bool) -> Self {
        self.looping = looping;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_json_defaults() {
        let layer: MusicLayer =
            serde_json::from_str(r#"{ "name": "explore", "clip": "explore_loop" }"#).unwrap();
        assert_eq!(layer, MusicLayer::new("explore", "explore_loop"));
        assert!(layer.looping);
    }
}
