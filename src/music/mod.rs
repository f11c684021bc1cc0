/// Music playback
///
/// A catalog of named layers and the two-channel state machine that fades
/// and crossfades between them.

pub mod layer;
pub mod machine;
pub mod state;

pub use layer::MusicLayer;
pub use machine::MusicStateMachine;
pub use state::MusicState;
