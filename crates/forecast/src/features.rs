//! Training table construction from raw history.

use crate::correlate;
use chrono::{DateTime, Datelike, FixedOffset, Timelike, Utc};
use common::timestamp;
use common::types::{Reservation, SensorReading};
use ndarray::{Array1, Array2};
use thiserror::Error;

/// Fewer readings than this are not worth a model.
pub const MIN_TRAINING_ROWS: usize = 50;

// Empty-room baseline, used when a column never reported at all.
pub const DEFAULT_TEMP_C: f64 = 22.0;
pub const DEFAULT_RH_PERCENT: f64 = 45.0;
pub const DEFAULT_CO2_PPM: f64 = 400.0;
pub const DEFAULT_VOC_INDEX: f64 = 50.0;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeatureError {
    #[error("insufficient data: {available} readings available, {required} required")]
    InsufficientData { available: usize, required: usize },
}

/// Hour of day and weekday (Monday = 0) of `at` in the interpretation offset.
pub fn calendar(at: &DateTime<Utc>, offset: &FixedOffset) -> (u32, u32) {
    let local = timestamp::interpret(at, offset);
    (local.hour(), local.weekday().num_days_from_monday())
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainingRow {
    pub hour: u32,
    pub day_of_week: u32,
    pub occupant_count: u32,
    pub temp_c: f64,
    pub co2_ppm: f64,
    pub voc_index: f64,
    pub rh_percent: f64,
}

/// Column a regressor is fitted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    TempC,
    Co2Ppm,
    VocIndex,
    RhPercent,
    Occupancy,
}

impl Target {
    pub const PHYSICAL: [Target; 4] = [
        Target::TempC,
        Target::Co2Ppm,
        Target::VocIndex,
        Target::RhPercent,
    ];

    fn of(self, row: &TrainingRow) -> f64 {
        match self {
            Target::TempC => row.temp_c,
            Target::Co2Ppm => row.co2_ppm,
            Target::VocIndex => row.voc_index,
            Target::RhPercent => row.rh_percent,
            Target::Occupancy => f64::from(row.occupant_count),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TrainingTable {
    rows: Vec<TrainingRow>,
}

impl TrainingTable {
    pub fn rows(&self) -> &[TrainingRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Feature matrix: (hour, day_of_week, occupant_count), or the first two
    /// columns only when `with_occupancy` is false.
    pub fn features(&self, with_occupancy: bool) -> Array2<f64> {
        let width = if with_occupancy { 3 } else { 2 };
        let mut x = Array2::zeros((self.rows.len(), width));
        for (i, row) in self.rows.iter().enumerate() {
            x[[i, 0]] = f64::from(row.hour);
            x[[i, 1]] = f64::from(row.day_of_week);
            if with_occupancy {
                x[[i, 2]] = f64::from(row.occupant_count);
            }
        }
        x
    }

    pub fn target(&self, target: Target) -> Array1<f64> {
        self.rows.iter().map(|row| target.of(row)).collect()
    }
}

/// Builds one row per reading.
///
/// Rows come out oldest first. Gaps in the physical columns are filled over
/// the store's newest-first listing (forward, then backward), so a gap takes
/// the next later value and only trailing gaps look back. No row is dropped.
pub fn build(
    readings: &[SensorReading],
    reservations: &[Reservation],
    offset: &FixedOffset,
) -> Result<TrainingTable, FeatureError> {
    if readings.len() < MIN_TRAINING_ROWS {
        return Err(FeatureError::InsufficientData {
            available: readings.len(),
            required: MIN_TRAINING_ROWS,
        });
    }

    let mut ordered: Vec<&SensorReading> = readings.iter().collect();
    ordered.sort_by_key(|r| r.recorded_at);

    let temp = fill_newest_first(ordered.iter().map(|r| r.temp_c).collect(), DEFAULT_TEMP_C);
    let co2 = fill_newest_first(ordered.iter().map(|r| r.co2_ppm).collect(), DEFAULT_CO2_PPM);
    let voc = fill_newest_first(ordered.iter().map(|r| r.voc_index).collect(), DEFAULT_VOC_INDEX);
    let rh = fill_newest_first(ordered.iter().map(|r| r.rh_percent).collect(), DEFAULT_RH_PERCENT);

    let rows = ordered
        .iter()
        .enumerate()
        .map(|(i, reading)| {
            let (hour, day_of_week) = calendar(&reading.recorded_at, offset);
            TrainingRow {
                hour,
                day_of_week,
                occupant_count: correlate::occupant_count(reading.recorded_at, reservations),
                temp_c: temp[i],
                co2_ppm: co2[i],
                voc_index: voc[i],
                rh_percent: rh[i],
            }
        })
        .collect();

    Ok(TrainingTable { rows })
}

/// `fill` over an oldest-first column walked newest first.
fn fill_newest_first(mut column: Vec<Option<f64>>, default: f64) -> Vec<f64> {
    column.reverse();
    let mut filled = fill(column, default);
    filled.reverse();
    filled
}

/// Forward fill, then backward fill; `default` only if nothing is present.
pub(crate) fn fill(column: Vec<Option<f64>>, default: f64) -> Vec<f64> {
    let first = column.iter().flatten().copied().next().unwrap_or(default);

    let mut last = None;
    column
        .into_iter()
        .map(|value| {
            if value.is_some() {
                last = value;
            }
            last.unwrap_or(first)
        })
        .collect()
}

#[cfg(test)]
mod tests;
