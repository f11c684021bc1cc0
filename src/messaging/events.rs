/// Notification types for the audio engine
///
/// Notifications describe things that have happened (past tense).
/// They are broadcast to every subscriber.
use crate::audio_system::category::AudioCategory;
use crate::audio_system::spatial::Vec3;
use crate::config::QualityTier;
use crate::music::MusicState;

/// Engine notifications
#[derive(Debug, Clone, PartialEq)]
pub enum AudioNotification {
    /// A music track started fading in, or a crossfade to it completed
    TrackChanged { name: String },

    /// Music playback state changed
    MusicStateChanged {
        old_state: MusicState,
        new_state: MusicState,
    },

    /// A category's bus volume setting changed
    CategoryVolumeChanged { category: AudioCategory, volume: f32 },

    /// The master volume changed
    MasterVolumeChanged { volume: f32 },

    /// An audio event was admitted and started
    EventPlayed {
        name: String,
        position: Option<Vec3>,
    },

    /// Output quality tier changed
    QualityChanged { quality: QualityTier },

    /// The engine is shutting down
    Shutdown,
}

impl AudioNotification {
    /// Get a human-readable description of the notification
    pub fn description(&self) -> String {
        match self {
            AudioNotification::TrackChanged { name } => format!("Track changed: {}", name),
            AudioNotification::MusicStateChanged { new_state, .. } => {
                format!("Music state: {}", new_state.description())
            }
            AudioNotification::CategoryVolumeChanged { category, volume } => {
                format!("{} volume: {:.2}", category, volume)
            }
            AudioNotification::MasterVolumeChanged { volume } => {
                format!("Master volume: {:.2}", volume)
            }
            AudioNotification::EventPlayed { name, position } => match position {
                Some(p) => format!("Event played: {} at ({:.1}, {:.1}, {:.1})", name, p.x, p.y, p.z),
                None => format!("Event played: {}", name),
            },
            AudioNotification::QualityChanged { quality } => {
                format!("Quality changed: {}", quality)
            }
            AudioNotification::Shutdown => "Shutting down".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_notification_description() {
        let n = AudioNotification::TrackChanged {
            name: "combat".to_string(),
        };
        assert_eq!(n.description(), "Track changed: combat");

        let n = AudioNotification::EventPlayed {
            name: "explosion".to_string(),
            position: Some(Vec3::new(1.0, 2.0, 3.0)),
        };
        assert_eq!(n.description(), "Event played: explosion at (1.0, 2.0, 3.0)");

        let n = AudioNotification::QualityChanged {
            quality: QualityTier::Low,
        };
        assert_eq!(n.description(), "Quality changed: low (22050 Hz)");
    }
}
