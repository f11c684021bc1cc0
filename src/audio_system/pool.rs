/// Channel pool
///
/// Per-category free and active lists of playback channels, bounded by a
/// global channel cap and a per-category growth bound.
///
/// Admission order for [`ChannelPool::acquire`]:
///
/// ```text
/// free list non-empty        -> pop it
/// below both caps            -> construct a new channel
/// active channel not playing -> reuse the first one, in insertion order
/// otherwise                  -> None (the caller drops the sound)
/// ```
use super::backend::AudioBackend;
use super::category::{AudioCategory, CategoryArray};
use super::channel::{ChannelHandle, PlaybackChannel};

/// Snapshot of one category's pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    /// Channels constructed so far
    pub allocated: usize,
    pub active: usize,
    pub free: usize,
    /// Growth bound for this category
    pub capacity: usize,
}

#[derive(Default)]
struct CategoryPool {
    channels: Vec<PlaybackChannel>,
    free: Vec<usize>,
    /// Slots in the order they became active
    active: Vec<usize>,
    capacity: usize,
}

impl CategoryPool {
    fn check_bookkeeping(&self) {
        debug_assert_eq!(
            self.free.len() + self.active.len(),
            self.channels.len(),
            "channel lost from pool bookkeeping"
        );
        debug_assert!(
            self.free.iter().all(|slot| !self.active.contains(slot)),
            "channel listed as both free and active"
        );
    }
}

pub struct ChannelPool {
    pools: CategoryArray<CategoryPool>,
    backend: Box<dyn AudioBackend>,
    max_channels: usize,
}

impl ChannelPool {
    /// Create an empty pool; channels are built on demand
    pub fn new(
        backend: Box<dyn AudioBackend>,
        max_channels: usize,
        capacities: CategoryArray<usize>,
    ) -> Self {
        Self {
            pools: CategoryArray::from_fn(|category| CategoryPool {
                capacity: capacities[category],
                ..CategoryPool::default()
            }),
            backend,
            max_channels,
        }
    }

    /// Channels constructed across every category
    pub fn total_channels(&self) -> usize {
        self.pools.values().map(|p| p.channels.len()).sum()
    }

    pub fn max_channels(&self) -> usize {
        self.max_channels
    }

    pub fn backend_mut(&mut self) -> &mut dyn AudioBackend {
        self.backend.as_mut()
    }

    /// Hand out a channel for `category`, or `None` when the category is
    /// saturated with sounds that are still playing
    pub fn acquire(&mut self, category: AudioCategory) -> Option<ChannelHandle> {
        let total = self.total_channels();
        let max_channels = self.max_channels;
        let pool = &mut self.pools[category];

        if let Some(slot) = pool.free.pop() {
            let channel = &mut pool.channels[slot];
            channel.reset();
            let generation = channel.bump_generation();
            pool.active.push(slot);
            pool.check_bookkeeping();
            return Some(ChannelHandle::new(category, slot, generation));
        }

        if total < max_channels && pool.channels.len() < pool.capacity {
            let voice = self.backend.create_voice(category);
            let mut channel = PlaybackChannel::new(category, voice);
            let generation = channel.bump_generation();
            let slot = pool.channels.len();
            pool.channels.push(channel);
            pool.active.push(slot);
            pool.check_bookkeeping();
            tracing::debug!(
                "Created {} channel #{} ({} of {} total)",
                category,
                slot,
                total + 1,
                max_channels
            );
            return Some(ChannelHandle::new(category, slot, generation));
        }

        // Oldest finished: first non-playing channel in insertion order
        let reusable = pool.active.iter().copied().find(|&slot| {
            let channel = &pool.channels[slot];
            !channel.is_playing() && !channel.is_reserved()
        });
        if let Some(slot) = reusable {
            let channel = &mut pool.channels[slot];
            channel.reset();
            let generation = channel.bump_generation();
            return Some(ChannelHandle::new(category, slot, generation));
        }

        tracing::debug!("{} pool exhausted, dropping request", category);
        None
    }

    /// Return a channel to its free list. Stale or already-free handles are
    /// a no-op; returns whether anything was released.
    pub fn release(&mut self, handle: ChannelHandle) -> bool {
        let pool = &mut self.pools[handle.category()];
        let Some(channel) = pool.channels.get_mut(handle.slot()) else {
            return false;
        };
        if channel.generation() != handle.generation() {
            return false;
        }
        let Some(pos) = pool.active.iter().position(|&s| s == handle.slot()) else {
            return false;
        };

        channel.reset();
        channel.set_reserved(false);
        channel.bump_generation();
        pool.active.remove(pos);
        pool.free.push(handle.slot());
        pool.check_bookkeeping();
        true
    }

    /// Exclude an active channel from reuse until it is released
    pub fn reserve(&mut self, handle: ChannelHandle) -> bool {
        match self.channel_mut(handle) {
            Some(channel) => {
                channel.set_reserved(true);
                true
            }
            None => false,
        }
    }

    pub fn channel(&self, handle: ChannelHandle) -> Option<&PlaybackChannel> {
        self.pools[handle.category()]
            .channels
            .get(handle.slot())
            .filter(|c| c.generation() == handle.generation())
    }

    pub fn channel_mut(&mut self, handle: ChannelHandle) -> Option<&mut PlaybackChannel> {
        self.pools[handle.category()]
            .channels
            .get_mut(handle.slot())
            .filter(|c| c.generation() == handle.generation())
    }

    /// Whether `handle` still refers to the channel it was issued for
    pub fn is_current(&self, handle: ChannelHandle) -> bool {
        self.channel(handle).is_some()
    }

    pub fn stats(&self, category: AudioCategory) -> PoolStats {
        let pool = &self.pools[category];
        PoolStats {
            allocated: pool.channels.len(),
            active: pool.active.len(),
            free: pool.free.len(),
            capacity: pool.capacity,
        }
    }

    /// Handles for every active channel of `category`, in insertion order
    pub fn active_handles(&self, category: AudioCategory) -> Vec<ChannelHandle> {
        let pool = &self.pools[category];
        pool.active
            .iter()
            .map(|&slot| ChannelHandle::new(category, slot, pool.channels[slot].generation()))
            .collect()
    }

    /// Advance every active channel's playback clock
    pub fn advance(&mut self, dt: f32) {
        for (_, pool) in self.pools.iter_mut() {
            for &slot in &pool.active {
                pool.channels[slot].advance(dt);
            }
        }
    }

    /// Push gains to every active channel's voice
    pub fn apply_outputs(&mut self, mut bus: impl FnMut(AudioCategory) -> (f32, f32)) {
        for (category, pool) in self.pools.iter_mut() {
            let (gain, pitch) = bus(category);
            for &slot in &pool.active {
                pool.channels[slot].apply_output(gain, pitch);
            }
        }
    }

    /// Stop everything and return every channel, reserved ones included
    pub fn release_all(&mut self) {
        for (_, pool) in self.pools.iter_mut() {
            for slot in pool.active.drain(..) {
                let channel = &mut pool.channels[slot];
                channel.reset();
                channel.set_reserved(false);
                channel.bump_generation();
                pool.free.push(slot);
            }
            pool.check_bookkeeping();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::backend::SilentBackend;
    use crate::audio_system::clip::AudioClip;

    fn pool(max_channels: usize, world_cap: usize) -> ChannelPool {
        let caps = CategoryArray::from_fn(|c| {
            if c == AudioCategory::WorldSfx {
                world_cap
            } else {
                4
            }
        });
        ChannelPool::new(Box::new(SilentBackend::new()), max_channels, caps)
    }

    fn start(pool: &mut ChannelPool, handle: ChannelHandle, duration: f32) {
        pool.channel_mut(handle)
            .unwrap()
            .play(AudioClip::silent("clip", duration), false);
    }

    #[test]
    fn test_acquire_grows_lazily() {
        let mut pool = pool(8, 2);
        assert_eq!(pool.total_channels(), 0);

        let a = pool.acquire(AudioCategory::WorldSfx).unwrap();
        assert_eq!(pool.stats(AudioCategory::WorldSfx).allocated, 1);
        assert_eq!(pool.stats(AudioCategory::WorldSfx).active, 1);
        assert!(pool.is_current(a));
    }

    #[test]
    fn test_release_is_idempotent() {
        let mut pool = pool(8, 2);
        let a = pool.acquire(AudioCategory::WorldSfx).unwrap();

        assert!(pool.release(a));
        assert!(!pool.release(a));

        let stats = pool.stats(AudioCategory::WorldSfx);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.free, 1);
    }

    #[test]
    fn test_free_list_is_reused_before_growing() {
        let mut pool = pool(8, 2);
        let a = pool.acquire(AudioCategory::WorldSfx).unwrap();
        pool.release(a);

        let b = pool.acquire(AudioCategory::WorldSfx).unwrap();
        assert_eq!(b.slot(), a.slot());
        assert_ne!(b.generation(), a.generation());
        assert_eq!(pool.stats(AudioCategory::WorldSfx).allocated, 1);
        assert!(!pool.is_current(a));
    }

    #[test]
    fn test_saturated_category_drops_request() {
        let mut pool = pool(8, 2);
        let a = pool.acquire(AudioCategory::WorldSfx).unwrap();
        let b = pool.acquire(AudioCategory::WorldSfx).unwrap();
        start(&mut pool, a, 1.0);
        start(&mut pool, b, 1.0);

        assert!(pool.acquire(AudioCategory::WorldSfx).is_none());
        let stats = pool.stats(AudioCategory::WorldSfx);
        assert_eq!(stats.allocated, 2);
        assert_eq!(stats.active + stats.free, 2);
    }

    #[test]
    fn test_reuse_takes_first_finished_in_insertion_order() {
        let mut pool = pool(8, 3);
        let a = pool.acquire(AudioCategory::WorldSfx).unwrap();
        let b = pool.acquire(AudioCategory::WorldSfx).unwrap();
        let c = pool.acquire(AudioCategory::WorldSfx).unwrap();
        start(&mut pool, a, 5.0);
        start(&mut pool, b, 0.1);
        start(&mut pool, c, 0.1);
        pool.advance(0.2);

        let reused = pool.acquire(AudioCategory::WorldSfx).unwrap();
        assert_eq!(reused.slot(), b.slot());
        assert!(!pool.is_current(b));
        assert!(pool.is_current(c));
        assert_eq!(pool.stats(AudioCategory::WorldSfx).active, 3);
    }

    #[test]
    fn test_global_cap_bounds_all_categories() {
        let mut pool = pool(3, 4);
        let a = pool.acquire(AudioCategory::WorldSfx).unwrap();
        let b = pool.acquire(AudioCategory::UiSfx).unwrap();
        let c = pool.acquire(AudioCategory::Voice).unwrap();
        for h in [a, b, c] {
            start(&mut pool, h, 1.0);
        }

        assert!(pool.acquire(AudioCategory::PlayerSfx).is_none());
        assert_eq!(pool.total_channels(), 3);
    }

    #[test]
    fn test_categories_never_share_channels() {
        let mut pool = pool(2, 4);
        let a = pool.acquire(AudioCategory::UiSfx).unwrap();
        pool.release(a);

        // A free UI channel does not serve WorldSfx once the cap is hit
        let b = pool.acquire(AudioCategory::WorldSfx).unwrap();
        start(&mut pool, b, 1.0);
        assert!(pool.acquire(AudioCategory::WorldSfx).is_none());
        assert_eq!(pool.stats(AudioCategory::UiSfx).free, 1);
    }

    #[test]
    fn test_reserved_channels_are_never_reused() {
        let mut pool = pool(8, 1);
        let a = pool.acquire(AudioCategory::WorldSfx).unwrap();
        assert!(pool.reserve(a));

        assert!(pool.acquire(AudioCategory::WorldSfx).is_none());
        assert!(pool.is_current(a));
    }

    #[test]
    fn test_release_all_frees_reserved() {
        let mut pool = pool(8, 2);
        let a = pool.acquire(AudioCategory::Music).unwrap();
        pool.reserve(a);
        start(&mut pool, a, 10.0);

        pool.release_all();
        assert!(!pool.is_current(a));
        assert_eq!(pool.stats(AudioCategory::Music).free, 1);
        assert_eq!(pool.stats(AudioCategory::Music).active, 0);
    }
}
