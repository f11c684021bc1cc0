/// Adaptive music modulation
///
/// Two smoothing stages sit between the game and the music channel:
///
/// ```text
/// GameStateProbe --(parameter_rate)--> parameters --(knob_rate)--> knobs
///   raw signals                        intensity, combat,          volume scale,
///                                      tension, exploration        pitch, ambient bus
/// ```
///
/// Both stages use exponential easing, so a step in the game signal never
/// produces a step in the audible output.
use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::effects::{approach, lerp};

pub const INTENSITY: &str = "intensity";
pub const COMBAT: &str = "combat";
pub const TENSION: &str = "tension";
pub const EXPLORATION: &str = "exploration";

/// Raw observation the host can report each frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum GameSignal {
    /// Progress through the current level, 0-1
    LevelProgress,
    /// 1 while fighting, 0 otherwise
    Combat,
    /// Nearby danger, 0-1
    Threat,
    /// Share of the map discovered, 0-1
    Exploration,
}

impl GameSignal {
    pub const ALL: [GameSignal; 4] = [
        GameSignal::LevelProgress,
        GameSignal::Combat,
        GameSignal::Threat,
        GameSignal::Exploration,
    ];

    /// Parameter this signal drives
    pub fn parameter(self) -> &'static str {
        match self {
            GameSignal::LevelProgress => INTENSITY,
            GameSignal::Combat => COMBAT,
            GameSignal::Threat => TENSION,
            GameSignal::Exploration => EXPLORATION,
        }
    }
}

/// Host hook sampled once per frame while music plays
pub trait GameStateProbe {
    /// Current value of `signal`, `None` if the game does not report it
    fn sample(&self, signal: GameSignal) -> Option<f32>;
}

/// A game that reports nothing
impl GameStateProbe for () {
    fn sample(&self, _signal: GameSignal) -> Option<f32> {
        None
    }
}

/// Fixed set of signal values
#[derive(Debug, Clone, Default)]
pub struct GameSnapshot {
    values: BTreeMap<GameSignal, f32>,
}

impl GameSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, signal: GameSignal, value: f32) -> Self {
        self.values.insert(signal, value);
        self
    }

    pub fn set(&mut self, signal: GameSignal, value: f32) {
        self.values.insert(signal, value);
    }
}

impl GameStateProbe for GameSnapshot {
    fn sample(&self, signal: GameSignal) -> Option<f32> {
        self.values.get(&signal).copied()
    }
}

/// Output range a parameter is mapped onto
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveRange {
    pub min: f32,
    pub max: f32,
}

impl CurveRange {
    pub fn map(&self, t: f32) -> f32 {
        lerp(self.min, self.max, t)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveConfig {
    pub enabled: bool,

    /// Easing rate from raw signal to parameter, per second
    pub parameter_rate: f32,

    /// Easing rate from parameter-derived target to knob, per second
    pub knob_rate: f32,

    /// Music volume scale across intensity 0-1
    pub intensity_volume: CurveRange,

    /// Music pitch across tension 0-1
    pub tension_pitch: CurveRange,

    /// Ambient bus scale across exploration 0-1
    pub exploration_ambient: CurveRange,
}

impl Default for AdaptiveConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            parameter_rate: 2.0,
            knob_rate: 1.0,
            intensity_volume: CurveRange { min: 0.7, max: 1.0 },
            tension_pitch: CurveRange { min: 1.0, max: 1.08 },
            exploration_ambient: CurveRange { min: 0.6, max: 1.0 },
        }
    }
}

/// Named parameters, each held in 0-1
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AdaptiveParameters {
    values: BTreeMap<String, f32>,
}

impl AdaptiveParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a parameter, clamped to 0-1. NaN is ignored and returns false.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        if value.is_nan() {
            tracing::debug!("Ignoring NaN for adaptive parameter {}", name);
            return false;
        }
        self.values.insert(name.to_string(), value.clamp(0.0, 1.0));
        true
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.values.get(name).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.values.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Smoothed knob values handed to the music player and ambient bus
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MusicModulation {
    pub volume_scale: f32,
    pub pitch: f32,
    pub ambient_scale: f32,
}

impl MusicModulation {
    pub const NEUTRAL: MusicModulation = MusicModulation {
        volume_scale: 1.0,
        pitch: 1.0,
        ambient_scale: 1.0,
    };
}

impl Default for MusicModulation {
    fn default() -> Self {
        Self::NEUTRAL
    }
}

pub struct AdaptiveModulator {
    config: AdaptiveConfig,
    params: AdaptiveParameters,
    knobs: MusicModulation,
}

impl AdaptiveModulator {
    pub fn new(config: AdaptiveConfig) -> Self {
        Self {
            config,
            params: AdaptiveParameters::new(),
            knobs: MusicModulation::NEUTRAL,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn parameters(&self) -> &AdaptiveParameters {
        &self.params
    }

    /// Override a parameter directly; it keeps easing toward game signals
    /// on later frames
    pub fn set_param(&mut self, name: &str, value: f32) -> bool {
        self.params.set(name, value)
    }

    pub fn param(&self, name: &str) -> Option<f32> {
        self.params.get(name)
    }

    pub fn knobs(&self) -> MusicModulation {
        self.knobs
    }

    /// Advance both smoothing stages by `dt` and return the knobs
    pub fn update(&mut self, dt: f32, probe: &dyn GameStateProbe) -> MusicModulation {
        for signal in GameSignal::ALL {
            let Some(raw) = probe.sample(signal).filter(|v| v.is_finite()) else {
                continue;
            };
            let raw = raw.clamp(0.0, 1.0);
            let name = signal.parameter();
            let eased = match self.params.get(name) {
                Some(current) => approach(current, raw, self.config.parameter_rate, dt),
                None => raw,
            };
            self.params.set(name, eased);
        }

        let targets = self.targets();
        let rate = self.config.knob_rate;
        self.knobs = MusicModulation {
            volume_scale: approach(self.knobs.volume_scale, targets.volume_scale, rate, dt),
            pitch: approach(self.knobs.pitch, targets.pitch, rate, dt),
            ambient_scale: approach(self.knobs.ambient_scale, targets.ambient_scale, rate, dt),
        };
        self.knobs
    }

    /// Where the knobs are heading; parameters never written stay neutral
    fn targets(&self) -> MusicModulation {
        let intensity = match (self.params.get(INTENSITY), self.params.get(COMBAT)) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        MusicModulation {
            volume_scale: intensity
                .map(|t| self.config.intensity_volume.map(t))
                .unwrap_or(1.0),
            pitch: self
                .params
                .get(TENSION)
                .map(|t| self.config.tension_pitch.map(t))
                .unwrap_or(1.0),
            ambient_scale: self
                .params
                .get(EXPLORATION)
                .map(|t| self.config.exploration_ambient.map(t))
                .unwrap_or(1.0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameters_clamp_and_ignore_nan() {
        let mut params = AdaptiveParameters::new();
        assert!(params.set(TENSION, 4.0));
        assert_eq!(params.get(TENSION), Some(1.0));

        assert!(!params.set(TENSION, f32::NAN));
        assert_eq!(params.get(TENSION), Some(1.0));
    }

    #[test]
    fn test_silent_probe_keeps_knobs_neutral() {
        let mut modulator = AdaptiveModulator::new(AdaptiveConfig::default());
        for _ in 0..60 {
            modulator.update(1.0 / 60.0, &());
        }
        assert_eq!(modulator.knobs(), MusicModulation::NEUTRAL);
    }

    #[test]
    fn test_knobs_ease_toward_targets() {
        let mut modulator = AdaptiveModulator::new(AdaptiveConfig::default());
        let probe = GameSnapshot::new().with(GameSignal::Threat, 1.0);

        let first = modulator.update(0.1, &probe).pitch;
        assert!(first > 1.0 && first < 1.08);

        let mut last = first;
        for _ in 0..600 {
            last = modulator.update(0.1, &probe).pitch;
        }
        assert!(last > first);
        assert!((last - 1.08).abs() < 1e-3);
    }

    #[test]
    fn test_combat_raises_intensity() {
        let mut modulator = AdaptiveModulator::new(AdaptiveConfig::default());
        let calm = GameSnapshot::new()
            .with(GameSignal::LevelProgress, 0.0)
            .with(GameSignal::Combat, 0.0);
        for _ in 0..600 {
            modulator.update(0.1, &calm);
        }
        let quiet = modulator.knobs().volume_scale;
        assert!((quiet - 0.7).abs() < 1e-3);

        let fight = GameSnapshot::new()
            .with(GameSignal::LevelProgress, 0.0)
            .with(GameSignal::Combat, 1.0);
        for _ in 0..600 {
            modulator.update(0.1, &fight);
        }
        assert!((modulator.knobs().volume_scale - 1.0).abs() < 1e-3);
    }

    #[test]
    fn test_non_finite_signals_are_skipped() {
        let mut modulator = AdaptiveModulator::new(AdaptiveConfig::default());
        let probe = GameSnapshot::new().with(GameSignal::Exploration, f32::INFINITY);
        modulator.update(0.5, &probe);
        assert_eq!(modulator.param(EXPLORATION), None);
    }
}
