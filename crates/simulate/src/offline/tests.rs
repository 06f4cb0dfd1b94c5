use super::*;
use crate::generate::{GenerateParams, generate};
use chrono::{NaiveDate, TimeZone};
use common::types::PlaceId;
use forecast::PlaceOutcome;
use forecast::forest::ForestParams;

fn settings() -> ForecastSettings {
    ForecastSettings {
        forest: ForestParams {
            tree_count: 10,
            ..ForestParams::default()
        },
        ..ForecastSettings::default()
    }
}

#[tokio::test]
async fn test_offline_cycle_writes_a_week() {
    let dataset = generate(&GenerateParams {
        days: 14,
        until: NaiveDate::from_ymd_opt(2024, 5, 20).unwrap(),
        places: vec![PlaceId::from("room1"), PlaceId::from("room2")],
        capacity: 6,
        booking_chance: 0.2,
        seed: 42,
    });
    let now = Utc.with_ymd_and_hms(2024, 5, 20, 6, 30, 0).unwrap();

    let (report, records) = run_forecast(&dataset, settings(), now).await.unwrap();

    assert_eq!(report.places.len(), 2);
    assert!(
        report
            .places
            .iter()
            .all(|p| matches!(p.outcome, PlaceOutcome::Completed { written: 168, .. }))
    );
    assert_eq!(records.len(), 2 * 168);
    assert_eq!(
        records[0].target_ts,
        Utc.with_ymd_and_hms(2024, 5, 20, 7, 0, 0).unwrap()
    );
    assert!(records.iter().all(|r| {
        (0.0..=1.0).contains(&r.predicted_comfort_score) && r.predicted_occupancy >= 0.0
    }));
}

#[tokio::test]
async fn test_offline_cycle_without_places_fails() {
    let result = run_forecast(&Dataset::default(), settings(), Utc::now()).await;
    assert!(result.is_err());
}
