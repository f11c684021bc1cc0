/// Authored event and music tables loaded from JSON
use std::collections::HashSet;
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::event::AudioEvent;
use crate::error::CatalogError;
use crate::music::MusicLayer;

/// Everything a host authors up front, in one file
///
/// ```json
/// {
///   "events": [{ "name": "footstep", "category": "PlayerSfx", "clips": ["step_01"] }],
///   "music":  [{ "name": "explore", "clip": "explore_loop", "fade_in": 2.0 }]
/// }
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioCatalog {
    pub events: Vec<AudioEvent>,
    pub music: Vec<MusicLayer>,
}

impl AudioCatalog {
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let catalog: AudioCatalog = serde_json::from_str(json)?;
        catalog.check_duplicates()?;
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let json = fs::read_to_string(path).map_err(|source| CatalogError::ReadFailed {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&json)?;
        tracing::info!(
            "Loaded catalog from {}: {} events, {} music layers",
            path.display(),
            catalog.events.len(),
            catalog.music.len()
        );
        Ok(catalog)
    }

    fn check_duplicates(&self) -> Result<(), CatalogError> {
        let mut seen = HashSet::new();
        for event in &self.events {
            if !seen.insert(event.name.as_str()) {
                return Err(CatalogError::Duplicate {
                    kind: "event",
                    name: event.name.clone(),
                });
            }
        }
        seen.clear();
        for layer in &self.music {
            if !seen.insert(layer.name.as_str()) {
                return Err(CatalogError::Duplicate {
                    kind: "music layer",
                    name: layer.name.clone(),
                });
            }
        }
        Ok(())
    }
}
