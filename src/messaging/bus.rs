/// Notification fan-out
///
/// Every subscriber owns an unbounded channel, so publishing from the audio
/// tick never waits on a slow reader. A subscriber may pass a filter to skip
/// high-frequency notifications such as `EventPlayed`. Receivers that were
/// dropped are pruned on the next publish.
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::events::AudioNotification;

/// Identifies one subscription for [`EventBus::unsubscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriberId(u64);

type Filter = Box<dyn Fn(&AudioNotification) -> bool + Send + Sync>;

struct Subscriber {
    id: SubscriberId,
    sender: Sender<AudioNotification>,
    accepts: Option<Filter>,
}

impl Subscriber {
    /// Deliver if wanted; false once the receiver is gone. A filtered-out
    /// notification keeps the subscriber until the next accepted one.
    fn deliver(&self, notification: &AudioNotification) -> bool {
        match &self.accepts {
            Some(accepts) if !accepts(notification) => true,
            _ => self.sender.try_send(notification.clone()).is_ok(),
        }
    }
}

/// Cloneable handle; clones share one subscriber list, so a host thread can
/// subscribe through a clone while the engine keeps publishing.
#[derive(Clone, Default)]
pub struct EventBus {
    subscribers: Arc<RwLock<Vec<Subscriber>>>,
    next_id: Arc<AtomicU64>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every notification
    pub fn subscribe(&self) -> (Receiver<AudioNotification>, SubscriberId) {
        self.add(None)
    }

    /// Receive only notifications `accepts` returns true for
    pub fn subscribe_filtered(
        &self,
        accepts: impl Fn(&AudioNotification) -> bool + Send + Sync + 'static,
    ) -> (Receiver<AudioNotification>, SubscriberId) {
        self.add(Some(Box::new(accepts)))
    }

    fn add(&self, accepts: Option<Filter>) -> (Receiver<AudioNotification>, SubscriberId) {
        let (sender, rx) = unbounded();
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.write().push(Subscriber {
            id,
            sender,
            accepts,
        });
        tracing::debug!("Notification subscriber {:?} added", id);
        (rx, id)
    }

    pub fn unsubscribe(&self, id: SubscriberId) {
        self.subscribers.write().retain(|s| s.id != id);
    }

    pub fn publish(&self, notification: AudioNotification) {
        tracing::trace!("{}", notification.description());
        self.subscribers
            .write()
            .retain(|subscriber| subscriber.deliver(&notification));
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}
