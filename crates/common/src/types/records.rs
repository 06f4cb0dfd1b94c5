use super::PlaceId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One environmental sample of a place. Physical fields are optional because
/// individual sensors may fail to report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorReading {
    pub place_id: PlaceId,
    pub recorded_at: DateTime<Utc>,
    pub temp_c: Option<f64>,
    pub rh_percent: Option<f64>,
    pub co2_ppm: Option<f64>,
    pub voc_index: Option<f64>,
    pub pir_occupied: bool,
    pub comfort_score: Option<f64>,
}

/// A booking of a place over the half-open interval `[start_ts, end_ts)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub place_id: PlaceId,
    pub start_ts: DateTime<Utc>,
    pub end_ts: DateTime<Utc>,
    pub attendee_count: u32,
}

impl Reservation {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start_ts <= at && at < self.end_ts
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRecord {
    pub place_id: PlaceId,
    pub target_ts: DateTime<Utc>,
    pub predicted_occupancy: f64,
    pub predicted_comfort_score: f64,
}
