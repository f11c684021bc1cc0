/// Messaging module for engine notifications
///
/// The engine publishes an [`AudioNotification`] whenever something a host
/// may want to react to happens: a track change, a volume change, an event
/// starting. Subscribers each get their own unbounded channel.
///
/// ## Architecture
///
/// ```text
/// ┌─────────────┐   publish   ┌─────────────┐   try_send   ┌─────────────┐
/// │ AudioEngine │ ──────────> │  Event Bus  │ ───────────> │ Subscribers │
/// │  (update)   │             │             │              │  (UI, HUD,  │
/// └─────────────┘             └─────────────┘              │   logging)  │
///                                                          └─────────────┘
/// ```
///
/// ## Usage
///
/// ```rust,ignore
/// let (rx, _id) = engine.subscribe();
///
/// engine.play_track("combat", true);
/// engine.update(dt, &scene, &game);
///
/// while let Ok(notification) = rx.try_recv() {
///     match notification {
///         AudioNotification::TrackChanged { name } => { /* update HUD */ },
///         _ => {}
///     }
/// }
/// ```

pub mod bus;
pub mod events;

// Re-export commonly used types
pub use bus::{EventBus, SubscriberId};
pub use events::AudioNotification;
