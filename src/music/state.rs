/// Music playback state
///
/// Represents the lifecycle of the music track with clear state transitions.
use std::fmt;

/// State of the music player
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub enum MusicState {
    /// Nothing is playing
    #[default]
    Stopped,

    /// A track is playing at its target volume
    Playing,

    /// Fading a fresh track in, or the current track out (transitional state)
    Fading,

    /// Playback held on the active channel
    Paused,

    /// Old track fading out while the new one fades in (transitional state)
    CrossFading,
}

impl MusicState {
    pub fn is_stopped(&self) -> bool {
        matches!(self, MusicState::Stopped)
    }

    pub fn is_playing(&self) -> bool {
        matches!(self, MusicState::Playing)
    }

    pub fn is_paused(&self) -> bool {
        matches!(self, MusicState::Paused)
    }

    /// Check if a fade of any kind is running
    pub fn is_transitioning(&self) -> bool {
        matches!(self, MusicState::Fading | MusicState::CrossFading)
    }

    /// Get a human-readable description of the state
    pub fn description(&self) -> &'static str {
        match self {
            MusicState::Stopped => "Stopped",
            MusicState::Playing => "Playing",
            MusicState::Fading => "Fading...",
            MusicState::Paused => "Paused",
            MusicState::CrossFading => "Crossfading...",
        }
    }
}

impl fmt::Display for MusicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}
