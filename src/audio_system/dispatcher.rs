/// Event dispatcher
///
/// Turns a play request for a named event into a configured, started
/// channel, or into nothing. Admission runs in a fixed order and the first
/// failing check drops the request:
///
/// ```text
/// lookup -> cooldown -> concurrency cap -> channel -> clip
/// ```
///
/// Every admitted play schedules exactly one completion, which gives the
/// concurrency slot back and returns the channel to the pool.
use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use super::category::{CategoryArray, CategoryMix};
use super::channel::{ChannelHandle, MAX_PITCH, MIN_PITCH};
use super::clip::{AssetSource, AudioClip};
use super::event::{AudioEvent, EventRegistry};
use super::pool::ChannelPool;
use super::scheduler::{ScheduledTask, Scheduler};
use super::spatial::{AnchorId, SpatialTracker, Vec3};

/// Per-event bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct EventRuntime {
    /// Engine time of the last admitted play
    pub last_fired: Option<f64>,

    /// Instances started and not yet completed
    pub active_instances: u32,
}

/// Where to place a sound
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlayRequest {
    /// World position, or the offset from `anchor` when one is given
    pub position: Option<Vec3>,
    pub anchor: Option<AnchorId>,
}

impl PlayRequest {
    pub fn at(position: Vec3) -> Self {
        Self {
            position: Some(position),
            anchor: None,
        }
    }

    pub fn attached(anchor: AnchorId, offset: Vec3) -> Self {
        Self {
            position: Some(offset),
            anchor: Some(anchor),
        }
    }
}

/// Engine state a play request touches
pub struct DispatchContext<'a> {
    pub now: f64,
    pub pool: &'a mut ChannelPool,
    pub assets: &'a dyn AssetSource,
    pub spatial: &'a mut SpatialTracker,
    pub scheduler: &'a mut Scheduler,
    pub categories: &'a CategoryArray<CategoryMix>,
}

pub struct EventDispatcher {
    registry: EventRegistry,
    runtime: HashMap<String, EventRuntime>,
    rng: StdRng,
    release_padding: f32,
}

impl EventDispatcher {
    /// `seed` fixes clip, volume and pitch variation; `None` seeds from
    /// entropy
    pub fn new(seed: Option<u64>, release_padding: f32) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            registry: EventRegistry::new(),
            runtime: HashMap::new(),
            rng,
            release_padding: release_padding.max(0.0),
        }
    }

    /// Add or replace an event. Replacing keeps the in-flight count so
    /// pending completions still balance.
    pub fn register(&mut self, event: AudioEvent) {
        self.runtime.entry(event.name.clone()).or_default();
        self.registry.register(event);
    }

    pub fn registry(&self) -> &EventRegistry {
        &self.registry
    }

    pub fn runtime(&self, name: &str) -> Option<EventRuntime> {
        self.runtime.get(name).copied()
    }

    pub fn active_instances(&self, name: &str) -> u32 {
        self.runtime
            .get(name)
            .map(|r| r.active_instances)
            .unwrap_or(0)
    }

    /// Try to play `name`. Returns the channel on success; every rejection
    /// is logged at debug level and returns `None`.
    pub fn play(
        &mut self,
        name: &str,
        request: PlayRequest,
        ctx: DispatchContext<'_>,
    ) -> Option<ChannelHandle> {
        let Some(event) = self.registry.get(name) else {
            tracing::debug!("Unknown audio event: {}", name);
            return None;
        };
        let runtime = self.runtime.entry(name.to_string()).or_default();

        if let Some(last) = runtime.last_fired {
            if ctx.now - last < f64::from(event.cooldown) {
                tracing::debug!("Event {} on cooldown", name);
                return None;
            }
        }
        if runtime.active_instances >= event.max_concurrent {
            tracing::debug!(
                "Event {} at concurrency cap ({})",
                name,
                event.max_concurrent
            );
            return None;
        }

        let handle = ctx.pool.acquire(event.category)?;

        let Some(clip) = Self::pick_clip(event, &mut self.rng, ctx.assets) else {
            tracing::debug!("No playable clip for event {}", name);
            ctx.pool.release(handle);
            return None;
        };
        let duration = clip.duration();
        let volume = event.volume.clamped(0.0, 1.0).sample(&mut self.rng);
        let pitch = event
            .pitch
            .clamped(MIN_PITCH, MAX_PITCH)
            .sample(&mut self.rng);
        let spatial = event
            .spatial
            .unwrap_or(ctx.categories[event.category].spatial);

        let channel = ctx.pool.channel_mut(handle)?;
        channel.set_volume(volume);
        channel.set_pitch(pitch);

        let placed = request.position.is_some() || request.anchor.is_some();
        if spatial && placed {
            let position = request.position.unwrap_or(Vec3::ZERO);
            let (min_distance, max_distance) = ctx
                .spatial
                .resolve_distances(event.min_distance, event.max_distance);
            channel.set_3d(
                position,
                min_distance,
                max_distance,
                ctx.spatial.doppler_level(),
            );
            if request.anchor.is_none() {
                let distance = position.distance(ctx.spatial.listener());
                let gain = ctx.spatial.gain_at(distance, min_distance, max_distance);
                channel.set_spatial_gain(gain);
            }
            ctx.spatial.track(handle, position, request.anchor);
        } else {
            channel.set_2d();
        }
        channel.play(clip, false);

        runtime.last_fired = Some(ctx.now);
        runtime.active_instances += 1;

        let due = ctx.now + f64::from(duration) + f64::from(self.release_padding);
        ctx.scheduler.schedule(
            due,
            ScheduledTask::EventFinished {
                event: name.to_string(),
                handle,
            },
        );

        tracing::debug!(
            "Playing event {} (vol {:.2}, pitch {:.2}, {})",
            name,
            volume,
            pitch,
            if spatial && placed { "3D" } else { "2D" }
        );
        Some(handle)
    }

    fn pick_clip(
        event: &AudioEvent,
        rng: &mut StdRng,
        assets: &dyn AssetSource,
    ) -> Option<AudioClip> {
        let name = if event.randomize_clip && event.clips.len() > 1 {
            event.clips.choose(rng)?
        } else {
            event.clips.first()?
        };
        assets.resolve(name)
    }

    /// Completion of one instance. The counter always drops by one; the
    /// channel is only released if the handle is still current.
    pub fn finish(
        &mut self,
        name: &str,
        handle: ChannelHandle,
        pool: &mut ChannelPool,
        spatial: &mut SpatialTracker,
    ) {
        if let Some(runtime) = self.runtime.get_mut(name) {
            runtime.active_instances = runtime.active_instances.saturating_sub(1);
        }
        spatial.untrack(handle);
        if !pool.release(handle) {
            tracing::trace!("Completion for {} found its channel already reused", name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_system::backend::SilentBackend;
    use crate::audio_system::category::AudioCategory;
    use crate::audio_system::clip::ClipLibrary;
    use crate::audio_system::spatial::{FalloffCurve, RolloffMode};

    struct Fixture {
        dispatcher: EventDispatcher,
        pool: ChannelPool,
        assets: ClipLibrary,
        spatial: SpatialTracker,
        scheduler: Scheduler,
        categories: CategoryArray<CategoryMix>,
    }

    impl Fixture {
        fn new() -> Self {
            let assets = ClipLibrary::new()
                .with_clip(AudioClip::silent("click", 0.2))
                .with_clip(AudioClip::silent("boom", 1.0));
            Self {
                dispatcher: EventDispatcher::new(Some(42), 0.1),
                pool: ChannelPool::new(
                    Box::new(SilentBackend::new()),
                    32,
                    CategoryArray::from_fn(|_| 4),
                ),
                assets,
                spatial: SpatialTracker::new(RolloffMode::Linear, FalloffCurve::flat(), 0.0),
                scheduler: Scheduler::new(),
                categories: CategoryArray::from_fn(CategoryMix::for_category),
            }
        }

        fn play(&mut self, name: &str, now: f64, request: PlayRequest) -> Option<ChannelHandle> {
            self.dispatcher.play(
                name,
                request,
                DispatchContext {
                    now,
                    pool: &mut self.pool,
                    assets: &self.assets,
                    spatial: &mut self.spatial,
                    scheduler: &mut self.scheduler,
                    categories: &self.categories,
                },
            )
        }
    }

    #[test]
    fn test_unknown_event_is_dropped() {
        let mut f = Fixture::new();
        assert!(f.play("nope", 0.0, PlayRequest::default()).is_none());
        assert_eq!(f.pool.total_channels(), 0);
    }

    #[test]
    fn test_cooldown_rejects_early_replay() {
        let mut f = Fixture::new();
        f.dispatcher.register(
            AudioEvent::new("click", AudioCategory::UiSfx)
                .with_clip("click")
                .with_cooldown(0.5),
        );

        assert!(f.play("click", 0.0, PlayRequest::default()).is_some());
        assert!(f.play("click", 0.3, PlayRequest::default()).is_none());
        assert!(f.play("click", 0.5, PlayRequest::default()).is_some());
    }

    #[test]
    fn test_concurrency_cap() {
        let mut f = Fixture::new();
        f.dispatcher.register(
            AudioEvent::new("boom", AudioCategory::WorldSfx)
                .with_clip("boom")
                .with_max_concurrent(2),
        );

        assert!(f.play("boom", 0.0, PlayRequest::default()).is_some());
        assert!(f.play("boom", 0.0, PlayRequest::default()).is_some());
        assert!(f.play("boom", 0.0, PlayRequest::default()).is_none());
        assert_eq!(f.dispatcher.active_instances("boom"), 2);
    }

    #[test]
    fn test_missing_clip_returns_channel() {
        let mut f = Fixture::new();
        f.dispatcher
            .register(AudioEvent::new("ghost", AudioCategory::UiSfx).with_clip("not_loaded"));

        assert!(f.play("ghost", 0.0, PlayRequest::default()).is_none());
        let stats = f.pool.stats(AudioCategory::UiSfx);
        assert_eq!(stats.active, 0);
        assert_eq!(stats.free, 1);
        assert_eq!(f.dispatcher.active_instances("ghost"), 0);
        assert!(f.scheduler.is_empty());
    }

    #[test]
    fn test_completion_scheduled_after_clip_plus_padding() {
        let mut f = Fixture::new();
        f.dispatcher
            .register(AudioEvent::new("boom", AudioCategory::WorldSfx).with_clip("boom"));

        f.play("boom", 2.0, PlayRequest::default()).unwrap();
        let due = f.scheduler.next_due().unwrap();
        assert!((due - 3.1).abs() < 1e-6);
    }

    #[test]
    fn test_finish_releases_and_decrements() {
        let mut f = Fixture::new();
        f.dispatcher
            .register(AudioEvent::new("boom", AudioCategory::WorldSfx).with_clip("boom"));
        let handle = f.play("boom", 0.0, PlayRequest::at(Vec3::new(3.0, 0.0, 0.0))).unwrap();
        assert!(f.spatial.contains(handle));

        f.dispatcher
            .finish("boom", handle, &mut f.pool, &mut f.spatial);
        assert_eq!(f.dispatcher.active_instances("boom"), 0);
        assert!(!f.spatial.contains(handle));
        assert!(!f.pool.is_current(handle));
    }

    #[test]
    fn test_stale_finish_leaves_new_owner_alone() {
        let mut f = Fixture::new();
        f.dispatcher
            .register(AudioEvent::new("click", AudioCategory::UiSfx).with_clip("click"));
        let first = f.play("click", 0.0, PlayRequest::default()).unwrap();
        f.pool.release(first);
        let second = f.play("click", 0.0, PlayRequest::default()).unwrap();
        assert_eq!(first.slot(), second.slot());

        f.dispatcher
            .finish("click", first, &mut f.pool, &mut f.spatial);
        assert_eq!(f.dispatcher.active_instances("click"), 1);
        assert!(f.pool.channel(second).unwrap().is_playing());
    }

    #[test]
    fn test_spatial_only_with_position() {
        let mut f = Fixture::new();
        f.dispatcher
            .register(AudioEvent::new("boom", AudioCategory::WorldSfx).with_clip("boom"));

        let flat = f.play("boom", 0.0, PlayRequest::default()).unwrap();
        assert!(!f.pool.channel(flat).unwrap().is_spatial());

        let placed = f.play("boom", 0.0, PlayRequest::at(Vec3::new(0.0, 0.0, 5.0))).unwrap();
        assert!(f.pool.channel(placed).unwrap().is_spatial());
        assert_eq!(f.spatial.len(), 1);
    }

    #[test]
    fn test_event_override_disables_spatial() {
        let mut f = Fixture::new();
        f.dispatcher.register(
            AudioEvent::new("boom", AudioCategory::WorldSfx)
                .with_clip("boom")
                .with_spatial(false),
        );
        let handle = f.play("boom", 0.0, PlayRequest::at(Vec3::new(1.0, 0.0, 0.0))).unwrap();
        assert!(!f.pool.channel(handle).unwrap().is_spatial());
        assert!(f.spatial.is_empty());
    }

    #[test]
    fn test_volume_and_pitch_within_ranges() {
        let mut f = Fixture::new();
        f.dispatcher.register(
            AudioEvent::new("click", AudioCategory::UiSfx)
                .with_clip("click")
                .with_volume(0.5, 0.6)
                .with_pitch(0.9, 1.1)
                .with_max_concurrent(100),
        );
        for i in 0..20 {
            let handle = f.play("click", f64::from(i), PlayRequest::default()).unwrap();
            let channel = f.pool.channel(handle).unwrap();
            assert!((0.5..=0.6).contains(&channel.volume()));
            assert!((0.9..=1.1).contains(&channel.pitch()));
            f.pool.release(handle);
        }
    }

    #[test]
    fn test_unusable_distances_still_play() {
        let mut f = Fixture::new();
        f.dispatcher.register(
            AudioEvent::new("boom", AudioCategory::WorldSfx)
                .with_clip("boom")
                .with_distances(-2.0, -1.0),
        );
        let handle = f.play("boom", 0.0, PlayRequest::at(Vec3::new(3.0, 0.0, 0.0))).unwrap();

        let channel = f.pool.channel(handle).unwrap();
        let placement = channel.spatial().unwrap();
        assert_eq!((placement.min_distance, placement.max_distance), (0.0, 0.0));
        assert!((0.0..=1.0).contains(&channel.spatial_gain()));
    }

    #[test]
    fn test_unset_distances_come_from_tracker() {
        let mut f = Fixture::new();
        f.spatial = SpatialTracker::new(RolloffMode::Linear, FalloffCurve::flat(), 0.0)
            .with_default_distances(2.0, 30.0);
        f.dispatcher
            .register(AudioEvent::new("boom", AudioCategory::WorldSfx).with_clip("boom"));
        let handle = f.play("boom", 0.0, PlayRequest::at(Vec3::new(16.0, 0.0, 0.0))).unwrap();

        let channel = f.pool.channel(handle).unwrap();
        let placement = channel.spatial().unwrap();
        assert_eq!((placement.min_distance, placement.max_distance), (2.0, 30.0));
        assert!((channel.spatial_gain() - 0.5).abs() < 1e-5);
    }

    #[test]
    fn test_extreme_ranges_are_clamped() {
        let mut f = Fixture::new();
        f.dispatcher.register(
            AudioEvent::new("click", AudioCategory::UiSfx)
                .with_clip("click")
                .with_volume(-3.0e38, 3.0e38)
                .with_pitch(f32::NEG_INFINITY, f32::INFINITY)
                .with_max_concurrent(100),
        );
        for i in 0..20 {
            let handle = f.play("click", f64::from(i), PlayRequest::default()).unwrap();
            let channel = f.pool.channel(handle).unwrap();
            assert!((0.0..=1.0).contains(&channel.volume()));
            assert!((MIN_PITCH..=MAX_PITCH).contains(&channel.pitch()));
            f.pool.release(handle);
        }
    }
}
