use super::*;
use crate::generate::{GenerateParams, generate};
use chrono::{Duration, NaiveDate};
use common::types::PlaceId;

fn history() -> Dataset {
    generate(&GenerateParams {
        days: 7,
        until: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        places: vec![PlaceId::from("room1")],
        capacity: 6,
        booking_chance: 0.2,
        seed: 42,
    })
}

#[test]
fn test_generated_history_overlaps() {
    let report = diagnose(&history());

    assert_eq!(report.readings, 7 * 66);
    assert!(report.matched > 0);
    assert!(!report.probable_timezone_mismatch());
    let ratio = report.occupancy_ratio().unwrap();
    assert!(ratio > 0.0 && ratio < 1.0);
}

#[test]
fn test_shifted_reservations_flag_mismatch() {
    let mut dataset = history();
    for r in &mut dataset.reservations {
        r.start_ts += Duration::hours(12);
        r.end_ts += Duration::hours(12);
    }

    let report = diagnose(&dataset);

    assert_eq!(report.matched, 0);
    assert!(report.probable_timezone_mismatch());
    assert_eq!(report.occupancy_ratio(), Some(0.0));
    assert!(report.sample_interval.is_some());
    assert!(report.sample_reading.is_some());
}

#[test]
fn test_other_place_reservations_do_not_match() {
    let mut dataset = history();
    for r in &mut dataset.reservations {
        r.place_id = PlaceId::from("room2");
    }

    assert_eq!(diagnose(&dataset).matched, 0);
}

#[test]
fn test_empty_dataset() {
    let report = diagnose(&Dataset::default());

    assert_eq!(report.occupancy_ratio(), None);
    assert!(!report.probable_timezone_mismatch());
}
