//! Record shapes as the store sends and accepts them, and their validation
//! into the typed records in `common::types`.

use common::timestamp;
use common::types::{ForecastRecord, Place, PlaceId, Reservation, SensorReading};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid {collection} record {id:?}: {reason}")]
pub struct InvalidRecord {
    pub collection: &'static str,
    pub id: Option<String>,
    pub reason: String,
}

impl InvalidRecord {
    fn new(collection: &'static str, id: &Option<String>, reason: impl Into<String>) -> Self {
        Self {
            collection,
            id: id.clone(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPage<T> {
    pub page: u32,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct RecordRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct RawPlace {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub capacity: Option<f64>,
    #[serde(default)]
    pub is_active: bool,
}

impl From<RawPlace> for Place {
    fn from(raw: RawPlace) -> Self {
        let capacity = raw
            .capacity
            .filter(|c| c.is_finite() && *c >= 1.0)
            .map(|c| c.round() as u32);
        Place {
            id: PlaceId::new(raw.id),
            name: raw.name,
            capacity,
            is_active: raw.is_active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RawSensorReading {
    #[serde(default)]
    pub id: Option<String>,
    pub place_id: String,
    pub recorded_at: String,
    #[serde(default)]
    pub temp_c: Option<f64>,
    #[serde(default)]
    pub rh_percent: Option<f64>,
    #[serde(default)]
    pub co2_ppm: Option<f64>,
    #[serde(default)]
    pub voc_index: Option<f64>,
    #[serde(default)]
    pub pir_occupied: bool,
    #[serde(default)]
    pub comfort_score: Option<f64>,
}

fn finite(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite())
}

impl TryFrom<RawSensorReading> for SensorReading {
    type Error = InvalidRecord;

    fn try_from(raw: RawSensorReading) -> Result<Self, Self::Error> {
        let recorded_at = timestamp::parse(&raw.recorded_at)
            .map_err(|e| InvalidRecord::new(crate::SENSOR_READINGS, &raw.id, e.to_string()))?;
        Ok(SensorReading {
            place_id: PlaceId::new(raw.place_id),
            recorded_at,
            temp_c: finite(raw.temp_c),
            rh_percent: finite(raw.rh_percent),
            co2_ppm: finite(raw.co2_ppm),
            voc_index: finite(raw.voc_index),
            pir_occupied: raw.pir_occupied,
            comfort_score: finite(raw.comfort_score),
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct RawReservation {
    #[serde(default)]
    pub id: Option<String>,
    pub place_id: String,
    pub start_ts: String,
    pub end_ts: String,
    #[serde(default)]
    pub attendee_count: i64,
}

impl TryFrom<RawReservation> for Reservation {
    type Error = InvalidRecord;

    fn try_from(raw: RawReservation) -> Result<Self, Self::Error> {
        let invalid = |reason: String| InvalidRecord::new(crate::RESERVATIONS, &raw.id, reason);

        let start_ts = timestamp::parse(&raw.start_ts).map_err(|e| invalid(e.to_string()))?;
        let end_ts = timestamp::parse(&raw.end_ts).map_err(|e| invalid(e.to_string()))?;
        if end_ts < start_ts {
            return Err(invalid(format!("ends before it starts: {} < {}", end_ts, start_ts)));
        }
        let attendee_count = u32::try_from(raw.attendee_count)
            .map_err(|_| invalid(format!("bad attendee_count: {}", raw.attendee_count)))?;

        Ok(Reservation {
            place_id: PlaceId::new(raw.place_id.clone()),
            start_ts,
            end_ts,
            attendee_count,
        })
    }
}

#[derive(Debug, Serialize)]
pub struct ForecastPayload<'a> {
    pub place_id: &'a str,
    pub target_ts: String,
    pub predicted_occupancy: f64,
    pub predicted_comfort_score: f64,
}

impl<'a> From<&'a ForecastRecord> for ForecastPayload<'a> {
    fn from(record: &'a ForecastRecord) -> Self {
        Self {
            place_id: record.place_id.as_str(),
            target_ts: timestamp::format(&record.target_ts),
            predicted_occupancy: record.predicted_occupancy,
            predicted_comfort_score: record.predicted_comfort_score,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReservationPayload<'a> {
    pub place_id: &'a str,
    pub start_ts: String,
    pub end_ts: String,
    pub attendee_count: u32,
}

impl<'a> From<&'a Reservation> for ReservationPayload<'a> {
    fn from(reservation: &'a Reservation) -> Self {
        Self {
            place_id: reservation.place_id.as_str(),
            start_ts: timestamp::format(&reservation.start_ts),
            end_ts: timestamp::format(&reservation.end_ts),
            attendee_count: reservation.attendee_count,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReadingPayload<'a> {
    pub place_id: &'a str,
    pub recorded_at: String,
    pub temp_c: Option<f64>,
    pub rh_percent: Option<f64>,
    pub co2_ppm: Option<f64>,
    pub voc_index: Option<f64>,
    pub pir_occupied: bool,
    pub comfort_score: Option<f64>,
}

impl<'a> From<&'a SensorReading> for ReadingPayload<'a> {
    fn from(reading: &'a SensorReading) -> Self {
        Self {
            place_id: reading.place_id.as_str(),
            recorded_at: timestamp::format(&reading.recorded_at),
            temp_c: reading.temp_c,
            rh_percent: reading.rh_percent,
            co2_ppm: reading.co2_ppm,
            voc_index: reading.voc_index,
            pir_occupied: reading.pir_occupied,
            comfort_score: reading.comfort_score,
        }
    }
}
