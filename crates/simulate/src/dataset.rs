use anyhow::{Context, Result};
use common::types::{Place, Reservation, SensorReading};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Everything the forecaster reads from the store, as one JSON document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub places: Vec<Place>,
    #[serde(default)]
    pub readings: Vec<SensorReading>,
    #[serde(default)]
    pub reservations: Vec<Reservation>,
}

impl Dataset {
    pub fn read_from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        serde_json::from_str(&json).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
