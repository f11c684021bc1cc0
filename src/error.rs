use thiserror::Error;

/// Engine-level errors using thiserror for structured error handling.
///
/// These cover construction and I/O only. Runtime playback paths never
/// return errors: admission drops, unknown names and invalid transitions
/// degrade to silence and are logged instead.

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Invalid engine configuration: {0}")]
    InvalidConfig(#[from] ConfigError),

    #[error("Could not reserve music channel {index} of 2 from the pool")]
    MusicReservationFailed { index: usize },
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Failed to initialize audio output stream")]
    StreamInitFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("Failed to read audio file: {path}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode clip: {name}")]
    DecodeFailed {
        name: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Error, Debug)]
pub enum SettingsError {
    #[error("Failed to read settings from {path}")]
    ReadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to write settings to {path}")]
    WriteFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Malformed value for {key}: {value:?}")]
    Malformed { key: String, value: String },

    #[error("No settings directory available on this platform")]
    NoSettingsDir,
}

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Failed to read audio catalog from {path}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse audio catalog")]
    ParseFailed(#[from] serde_json::Error),

    #[error("Duplicate {kind} name in catalog: {name}")]
    Duplicate { kind: &'static str, name: String },
}

/// Type alias for application Results using anyhow for context chaining
pub type AppResult<T> = anyhow::Result<T>;
