#![deny(warnings)]

pub mod auth;
pub mod client;
pub mod error;
#[cfg(any(test, feature = "memory"))]
pub mod memory;
pub mod wire;

pub use auth::{AuthStrategy, Credentials};
pub use client::{StoreClient, StoreClientConfig};
pub use error::StoreError;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{ForecastRecord, Place, PlaceId, Reservation, SensorReading};
use serde::{Deserialize, Serialize};
use std::fmt;

pub type Result<T> = std::result::Result<T, StoreError>;

pub const PLACES: &str = "places";
pub const SENSOR_READINGS: &str = "sensor_readings";
pub const RESERVATIONS: &str = "reservations";
pub const FORECASTS: &str = "forecasts";

/// Store-assigned identifier of a record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Query/CRUD capability of the record store, keyed by place.
///
/// Reads fail as a whole; callers decide whether a single failed write
/// matters.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exchanges the configured credentials for a session.
    async fn authenticate(&mut self) -> Result<()>;

    async fn list_active_places(&self) -> Result<Vec<Place>>;

    async fn get_place(&self, id: &PlaceId) -> Result<Place>;

    /// Readings of `place` recorded at or after `since`, oldest first.
    async fn list_readings_since(
        &self,
        place: &PlaceId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>>;

    async fn list_reservations(&self, place: &PlaceId) -> Result<Vec<Reservation>>;

    async fn list_forecast_ids(&self, place: &PlaceId) -> Result<Vec<RecordId>>;

    async fn delete_forecast(&self, id: &RecordId) -> Result<()>;

    async fn create_forecast(&self, record: &ForecastRecord) -> Result<()>;

    async fn create_reading(&self, reading: &SensorReading) -> Result<()>;

    async fn create_reservation(&self, reservation: &Reservation) -> Result<()>;
}
