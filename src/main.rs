use std::path::{Path, PathBuf};

use anyhow::{bail, Context};

use game_audio_core::audio_system::AudioBackend;
use game_audio_core::{
    AnchorId, AppResult, AudioCatalog, AudioCategory, AudioClip, AudioEngine, AudioEvent,
    AudioNotification, AudioSettings, ClipLibrary, EngineConfig, GameSignal, GameSnapshot,
    JsonFileStore, MusicLayer, SceneSnapshot, Vec3,
};

const LOG_TARGET_STARTUP: &str = "game_audio_sim::startup";
const FRAME_DT: f32 = 1.0 / 60.0;

const USAGE: &str = "Usage: game-audio-sim [--config FILE] [--catalog FILE] [--frames N] \
[--settings FILE] [--log-dir DIR] [--assets DIR]";

struct Args {
    config: Option<PathBuf>,
    catalog: Option<PathBuf>,
    frames: u32,
    settings: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    assets: Option<PathBuf>,
}

fn parse_args() -> AppResult<Args> {
    let mut args = Args {
        config: None,
        catalog: None,
        frames: 1200,
        settings: None,
        log_dir: None,
        assets: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(flag) = iter.next() {
        let mut value = || {
            iter.next()
                .with_context(|| format!("{} needs a value\n{}", flag, USAGE))
        };
        match flag.as_str() {
            "--config" => args.config = Some(PathBuf::from(value()?)),
            "--catalog" => args.catalog = Some(PathBuf::from(value()?)),
            "--frames" => {
                let raw = value()?;
                args.frames = raw
                    .parse()
                    .with_context(|| format!("--frames expects a number, got {:?}", raw))?;
            }
            "--settings" => args.settings = Some(PathBuf::from(value()?)),
            "--log-dir" => args.log_dir = Some(PathBuf::from(value()?)),
            "--assets" => args.assets = Some(PathBuf::from(value()?)),
            "-h" | "--help" => {
                println!("{}", USAGE);
                std::process::exit(0);
            }
            other => bail!("Unknown argument: {}\n{}", other, USAGE),
        }
    }
    Ok(args)
}

/// Initialize tracing: console always, plus a daily-rotated file when a log
/// directory is given
fn initialize_tracing(log_dir: Option<&Path>) {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    // Configure filter (info level by default)
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = log_dir.and_then(|dir| {
        // Create log directory if it doesn't exist
        if let Err(e) = std::fs::create_dir_all(dir) {
            eprintln!("Warning: Failed to create log directory: {}", e);
            return None;
        }
        Some(
            fmt::layer()
                .with_writer(rolling::daily(dir, "game-audio-sim.log"))
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
    });

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_ansi(true)
        .with_target(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(dir) = log_dir {
        tracing::info!("Log directory: {}", dir.display());
    }
}

/// Catalog used when none is given on the command line
fn demo_catalog() -> AudioCatalog {
    AudioCatalog {
        events: vec![
            AudioEvent::new("footstep", AudioCategory::PlayerSfx)
                .with_clip("step_01")
                .with_clip("step_02")
                .with_clip("step_03")
                .with_volume(0.8, 1.0)
                .with_pitch(0.95, 1.05)
                .with_cooldown(0.25),
            AudioEvent::new("explosion", AudioCategory::WorldSfx)
                .with_clip("boom")
                .with_max_concurrent(3)
                .with_distances(2.0, 60.0),
            AudioEvent::new("ui_click", AudioCategory::UiSfx).with_clip("click"),
            AudioEvent::new("enemy_growl", AudioCategory::WorldSfx)
                .with_clip("growl")
                .with_cooldown(1.5),
        ],
        music: vec![
            MusicLayer::new("explore", "explore_loop").with_fades(2.0, 1.5),
            MusicLayer::new("combat", "combat_loop")
                .with_fades(0.5, 1.0)
                .with_volume(0.9),
        ],
    }
}

/// Timing-only clips for every asset the catalog names
fn silent_clips(catalog: &AudioCatalog) -> ClipLibrary {
    let mut clips = ClipLibrary::new();
    for layer in &catalog.music {
        clips.insert(AudioClip::silent(layer.clip.as_str(), 45.0));
    }
    for event in &catalog.events {
        for clip in &event.clips {
            clips.insert(AudioClip::silent(clip.as_str(), 0.6));
        }
    }
    clips
}

#[cfg(feature = "rodio-backend")]
fn build_backend(
    catalog: &AudioCatalog,
    assets: Option<&Path>,
) -> AppResult<(Box<dyn AudioBackend>, ClipLibrary)> {
    use game_audio_core::audio_system::rodio_backend::{load_clip, RodioBackend};

    let Some(dir) = assets else {
        tracing::info!("No --assets directory, rendering silently");
        return Ok((
            Box::new(game_audio_core::audio_system::SilentBackend::new()),
            silent_clips(catalog),
        ));
    };

    let mut clips = ClipLibrary::new();
    let names = catalog
        .music
        .iter()
        .map(|l| l.clip.as_str())
        .chain(catalog.events.iter().flat_map(|e| e.clips.iter().map(String::as_str)));
    for name in names {
        let found = ["mp3", "wav", "ogg", "flac"]
            .iter()
            .map(|ext| dir.join(format!("{}.{}", name, ext)))
            .find(|path| path.exists());
        match found {
            Some(path) => clips.insert(load_clip(name, &path)?),
            None => tracing::warn!("No audio file for clip {} in {}", name, dir.display()),
        }
    }

    let backend = RodioBackend::new().context("Failed to open audio output")?;
    Ok((Box::new(backend), clips))
}

#[cfg(not(feature = "rodio-backend"))]
fn build_backend(
    catalog: &AudioCatalog,
    assets: Option<&Path>,
) -> AppResult<(Box<dyn AudioBackend>, ClipLibrary)> {
    if assets.is_some() {
        tracing::warn!("--assets needs the rodio-backend feature, rendering silently");
    }
    Ok((
        Box::new(game_audio_core::audio_system::SilentBackend::new()),
        silent_clips(catalog),
    ))
}

/// Scripted session: explore, a fight with an enemy circling the listener,
/// back to explore, then fade out
fn run_simulation(engine: &mut AudioEngine, frames: u32) {
    // Per-event notifications are only worth queueing when they get logged
    let verbose = tracing::enabled!(tracing::Level::DEBUG);
    let (rx, _id) = engine.subscribe_filtered(move |notification| {
        verbose || !matches!(notification, AudioNotification::EventPlayed { .. })
    });
    let enemy = AnchorId(1);
    let mut game = GameSnapshot::new();

    let combat_start = frames * 2 / 5;
    let combat_end = frames * 7 / 10;
    let fade_out = frames * 9 / 10;

    engine.play_track("explore", false);

    for frame in 0..frames {
        let t = frame as f32 * FRAME_DT;
        let progress = frame as f32 / frames.max(1) as f32;
        let in_combat = (combat_start..combat_end).contains(&frame);

        let listener = Vec3::new(t * 1.5, 0.0, 0.0);
        let enemy_position = listener + Vec3::new(8.0 * t.cos(), 0.0, 8.0 * t.sin());
        let scene = SceneSnapshot::at(listener).with_anchor(enemy, enemy_position);

        game.set(GameSignal::LevelProgress, progress);
        game.set(GameSignal::Combat, if in_combat { 1.0 } else { 0.0 });
        game.set(GameSignal::Threat, if in_combat { 0.8 } else { 0.1 });
        game.set(GameSignal::Exploration, progress);

        if frame % 20 == 0 {
            engine.play_event("footstep", None, None);
        }
        if frame == combat_start {
            engine.play_event("ui_click", None, None);
            engine.play_track("combat", true);
        }
        if in_combat && frame % 45 == 0 {
            engine.play_event("explosion", Some(enemy_position), None);
            engine.play_event("enemy_growl", Some(Vec3::new(0.0, 1.5, 0.0)), Some(enemy));
        }
        if frame == combat_end {
            engine.play_track("explore", true);
        }
        if frame == fade_out {
            engine.stop_music(None);
        }

        engine.update(FRAME_DT, &scene, &game);

        for notification in rx.try_iter() {
            match notification {
                AudioNotification::EventPlayed { .. } => {
                    tracing::debug!("{}", notification.description())
                }
                _ => tracing::info!("{}", notification.description()),
            }
        }
    }
}

fn main() -> AppResult<()> {
    let args = parse_args()?;
    initialize_tracing(args.log_dir.as_deref());

    tracing::info!(
        target: LOG_TARGET_STARTUP,
        "Starting game-audio-sim v{} ({})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::ARCH
    );

    let config = match &args.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    let catalog = match &args.catalog {
        Some(path) => AudioCatalog::load(path)?,
        None => demo_catalog(),
    };

    let (backend, clips) = build_backend(&catalog, args.assets.as_deref())?;
    let mut engine = AudioEngine::new(config, backend, Box::new(clips))?;
    engine.load_catalog(catalog);

    let mut store = match &args.settings {
        Some(path) => Some(JsonFileStore::open(path)?),
        None => None,
    };
    if let Some(store) = &store {
        let stored = engine.load_settings(store)?;
        let settings = AudioSettings::capture(&engine);
        tracing::info!(
            "Applied {} saved settings: master {:.2}, music {:.2}, sfx {:.2}, voice {:.2}, {}",
            stored.len(),
            settings.master_volume,
            settings.music_volume,
            settings.sfx_volume,
            settings.voice_volume,
            settings.quality
        );
    }

    run_simulation(&mut engine, args.frames);

    let diagnostics = engine.diagnostics();
    tracing::info!(
        "Simulated {:.1}s: {} of {} channels allocated, {} spatial sources, {} pending completions, music {}",
        diagnostics.now,
        diagnostics.total_channels,
        diagnostics.max_channels,
        diagnostics.spatial_sources,
        diagnostics.pending_completions,
        diagnostics.music_state
    );
    for (category, stats) in diagnostics.pools.iter() {
        tracing::info!(
            "  {:<11} allocated {} / {}, active {}, free {}",
            category.to_string(),
            stats.allocated,
            stats.capacity,
            stats.active,
            stats.free
        );
    }

    if let Some(store) = store.as_mut() {
        engine.save_settings(store)?;
    }
    engine.shutdown();
    Ok(())
}
