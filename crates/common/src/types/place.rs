use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a monitored room in the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceId(String);

impl PlaceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlaceId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: PlaceId,
    pub name: String,
    /// Seats in the room; some places are registered without one.
    pub capacity: Option<u32>,
    pub is_active: bool,
}

impl Place {
    pub fn capacity_or(&self, default: u32) -> u32 {
        match self.capacity {
            Some(c) if c > 0 => c,
            _ => default,
        }
    }
}
