use crate::dataset::Dataset;
use chrono::{DateTime, Utc};
use common::types::{Reservation, SensorReading};

/// How many readings fall inside a reservation of their own place.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlapReport {
    pub readings: usize,
    pub reservations: usize,
    pub matched: usize,
    /// First reservation interval and first reading time, shown when
    /// nothing matches.
    pub sample_interval: Option<(DateTime<Utc>, DateTime<Utc>)>,
    pub sample_reading: Option<DateTime<Utc>>,
}

impl OverlapReport {
    pub fn occupancy_ratio(&self) -> Option<f64> {
        (self.readings > 0).then(|| self.matched as f64 / self.readings as f64)
    }

    /// Both sides present but no overlap at all: the two were almost
    /// certainly written with different clocks or zones.
    pub fn probable_timezone_mismatch(&self) -> bool {
        self.readings > 0 && self.reservations > 0 && self.matched == 0
    }
}

pub fn diagnose(dataset: &Dataset) -> OverlapReport {
    let matched = dataset
        .readings
        .iter()
        .filter(|r| overlaps(r, &dataset.reservations))
        .count();

    OverlapReport {
        readings: dataset.readings.len(),
        reservations: dataset.reservations.len(),
        matched,
        sample_interval: dataset.reservations.first().map(|r| (r.start_ts, r.end_ts)),
        sample_reading: dataset.readings.first().map(|r| r.recorded_at),
    }
}

fn overlaps(reading: &SensorReading, reservations: &[Reservation]) -> bool {
    reservations
        .iter()
        .any(|r| r.place_id == reading.place_id && r.contains(reading.recorded_at))
}

pub fn print_report(report: &OverlapReport) {
    println!("\n=== Overlap Report ===");
    println!("Readings:     {}", report.readings);
    println!("Reservations: {}", report.reservations);
    println!("Matched:      {}", report.matched);

    if report.readings == 0 || report.reservations == 0 {
        println!("\nMissing data: generate or import readings and reservations first.");
        return;
    }

    if report.probable_timezone_mismatch() {
        println!("\nNo reading falls inside any reservation.");
        println!("Probable cause: timezone mismatch between the two sources (UTC vs local).");
        if let Some((start, end)) = report.sample_interval {
            println!("Reservation: {} - {}", start, end);
        }
        if let Some(at) = report.sample_reading {
            println!("Reading:     {}", at);
        }
    } else if let Some(ratio) = report.occupancy_ratio() {
        println!("Occupancy ratio: {:.1}%", ratio * 100.0);
    }
}

#[cfg(test)]
mod tests;
