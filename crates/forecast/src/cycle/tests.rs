use super::*;
use chrono::{Datelike, TimeZone};
use common::config::ConfigGuard;
use common::types::SensorReading;
use persistence::memory::MemoryStore;
use serial_test::serial;
use std::collections::BTreeSet;

fn now() -> DateTime<Utc> {
    // Monday
    Utc.with_ymd_and_hms(2024, 5, 20, 9, 17, 42).unwrap()
}

fn room() -> Place {
    Place {
        id: PlaceId::from("room1"),
        name: "Room 1".to_string(),
        capacity: Some(6),
        is_active: true,
    }
}

/// Two weeks of office-hours readings with a daily 09:00–13:00 meeting.
fn history(place: &PlaceId) -> (Vec<SensorReading>, Vec<Reservation>) {
    let first_day = (now() - Duration::days(14))
        .date_naive()
        .and_hms_opt(8, 0, 0)
        .unwrap()
        .and_utc();
    let mut reservations = Vec::new();
    let mut readings = Vec::new();

    for day in 0..14 {
        let open = first_day + Duration::days(day);
        if open.weekday().num_days_from_monday() >= 5 {
            continue;
        }
        reservations.push(Reservation {
            place_id: place.clone(),
            start_ts: open + Duration::hours(1),
            end_ts: open + Duration::hours(5),
            attendee_count: 4,
        });
        for slot in 0..66 {
            let at = open + Duration::minutes(10 * slot);
            let booked = reservations.iter().any(|r| r.contains(at));
            readings.push(SensorReading {
                place_id: place.clone(),
                recorded_at: at,
                temp_c: Some(if booked { 23.4 } else { 22.0 }),
                rh_percent: if slot % 7 == 0 { None } else { Some(45.0) },
                co2_ppm: Some(if booked { 1050.0 } else { 420.0 }),
                voc_index: Some(if booked { 160.0 } else { 55.0 }),
                pir_occupied: booked,
                comfort_score: None,
            });
        }
    }
    (readings, reservations)
}

fn seeded_store() -> MemoryStore {
    let place = room();
    let (readings, reservations) = history(&place.id);
    MemoryStore::new()
        .with_place(place)
        .with_readings(readings)
        .with_reservations(reservations)
}

fn settings() -> ForecastSettings {
    ForecastSettings {
        forest: ForestParams {
            tree_count: 10,
            ..ForestParams::default()
        },
        ..ForecastSettings::default()
    }
}

#[test]
fn test_horizon_starts_at_next_full_hour() {
    let utc = timestamp::utc_offset();
    assert_eq!(
        horizon_start(now(), &utc),
        Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap()
    );
    let on_the_hour = Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap();
    assert_eq!(
        horizon_start(on_the_hour, &utc),
        Utc.with_ymd_and_hms(2024, 5, 20, 10, 0, 0).unwrap()
    );

    // 14:47 at +05:30, so the next local hour is 15:00 = 09:30 UTC
    let india = FixedOffset::east_opt(5 * 3600 + 1800).unwrap();
    assert_eq!(
        horizon_start(now(), &india),
        Utc.with_ymd_and_hms(2024, 5, 20, 9, 30, 0).unwrap()
    );

    let slots = horizon(now(), &utc);
    assert_eq!(slots.len(), FORECAST_HORIZON_HOURS);
    assert!(slots.windows(2).all(|w| w[1] - w[0] == Duration::hours(1)));
}

#[tokio::test]
async fn test_cycle_writes_a_full_week() {
    let mut forecaster = Forecaster::new(seeded_store(), settings());

    let report = forecaster.run_cycle_at(now()).await.unwrap();

    assert_eq!(report.places.len(), 1);
    assert_eq!(
        report.places[0].outcome,
        PlaceOutcome::Completed {
            written: 168,
            failed_writes: 0,
            deleted: 0,
            failed_deletes: 0,
        }
    );
    assert_eq!(
        forecaster.transitions(),
        &[
            CycleState::Authenticating,
            CycleState::FetchingHistory,
            CycleState::Training,
            CycleState::Predicting,
            CycleState::Persisting,
            CycleState::Idle,
        ]
    );
    assert_eq!(forecaster.state(), CycleState::Idle);
    assert!(forecaster.store().is_authenticated());

    let stored = forecaster.store().forecasts_for(&room().id);
    assert_eq!(stored.len(), 168);
    assert_eq!(stored[0].target_ts, report.horizon_start);
    let distinct: BTreeSet<_> = stored.iter().map(|f| f.target_ts).collect();
    assert_eq!(distinct.len(), 168);
    assert!(stored
        .iter()
        .all(|f| (0.0..=1.0).contains(&f.predicted_comfort_score)));
}

#[tokio::test]
async fn test_consecutive_cycles_replace_forecasts() {
    let mut forecaster = Forecaster::new(seeded_store(), settings());

    forecaster.run_cycle_at(now()).await.unwrap();
    let first = forecaster.store().forecasts_for(&room().id);
    let report = forecaster.run_cycle_at(now()).await.unwrap();
    let second = forecaster.store().forecasts_for(&room().id);

    assert_eq!(
        report.places[0].outcome,
        PlaceOutcome::Completed {
            written: 168,
            failed_writes: 0,
            deleted: 168,
            failed_deletes: 0,
        }
    );
    assert_eq!(second.len(), 168);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_learned_meeting_shapes_the_forecast() {
    let mut forecaster = Forecaster::new(seeded_store(), settings());
    forecaster.run_cycle_at(now()).await.unwrap();
    let stored = forecaster.store().forecasts_for(&room().id);

    let at = |day: i64, hour: u32| {
        let target = (now() + Duration::days(day))
            .date_naive()
            .and_hms_opt(hour, 0, 0)
            .unwrap()
            .and_utc();
        stored
            .iter()
            .find(|f| f.target_ts == target)
            .cloned()
            .unwrap()
    };

    // Tuesday: the regular meeting is learned, the night stays empty
    let meeting = at(1, 11);
    let night = at(1, 3);
    // smoothing keeps a four-hour meeting above the split between the
    // empty (0) and booked (4) rows the condition forests were trained on
    assert!(meeting.predicted_occupancy > 3.0, "{:?}", meeting);
    assert_eq!(night.predicted_occupancy, 0.0);
    assert_eq!(night.predicted_comfort_score, 1.0);
    assert!(meeting.predicted_comfort_score < 0.95, "{:?}", meeting);

    // quiet business hours are floored to 15–25 % of six seats
    let afternoon = at(1, 16);
    assert!((0.9..=1.5).contains(&afternoon.predicted_occupancy), "{:?}", afternoon);
}

#[tokio::test]
async fn test_booked_hours_use_attendee_count() {
    let place = room();
    let start = (now() + Duration::days(2))
        .date_naive()
        .and_hms_opt(0, 0, 0)
        .unwrap()
        .and_utc();
    let store = seeded_store().with_reservations(vec![Reservation {
        place_id: place.id.clone(),
        start_ts: start,
        end_ts: start + Duration::hours(5),
        attendee_count: 5,
    }]);
    let mut forecaster = Forecaster::new(store, settings());
    forecaster.run_cycle_at(now()).await.unwrap();

    let stored = forecaster.store().forecasts_for(&place.id);
    let middle = stored
        .iter()
        .find(|f| f.target_ts == start + Duration::hours(2))
        .unwrap();
    assert_eq!(middle.predicted_occupancy, 5.0);
}

#[tokio::test]
async fn test_insufficient_history_leaves_forecasts_alone() {
    let place = room();
    let (readings, _) = history(&place.id);
    let old = ForecastRecord {
        place_id: place.id.clone(),
        target_ts: now(),
        predicted_occupancy: 1.0,
        predicted_comfort_score: 0.9,
    };
    let store = MemoryStore::new()
        .with_place(place.clone())
        .with_readings(readings.into_iter().take(49))
        .with_forecasts(vec![old.clone()]);
    let mut forecaster = Forecaster::new(store, settings());

    let report = forecaster.run_cycle_at(now()).await.unwrap();

    assert_eq!(
        report.places[0].outcome,
        PlaceOutcome::InsufficientData {
            available: 49,
            required: 50
        }
    );
    assert_eq!(forecaster.store().forecasts_for(&place.id), vec![old]);
    assert!(!forecaster.transitions().contains(&CycleState::Training));
}

#[tokio::test]
async fn test_authentication_failure_aborts() {
    let mut forecaster = Forecaster::new(seeded_store().rejecting_auth(), settings());

    let err = forecaster.run_cycle_at(now()).await.unwrap_err();

    assert!(matches!(err, CycleError::Authentication(_)));
    assert_eq!(
        forecaster.transitions(),
        &[CycleState::Authenticating, CycleState::Idle]
    );
    assert!(forecaster.store().forecasts_for(&room().id).is_empty());
}

#[tokio::test]
async fn test_no_active_place() {
    let mut inactive = room();
    inactive.is_active = false;
    let mut forecaster = Forecaster::new(MemoryStore::new().with_place(inactive), settings());

    let err = forecaster.run_cycle_at(now()).await.unwrap_err();
    assert_eq!(err, CycleError::NoActivePlace);
}

#[tokio::test]
async fn test_configured_place_must_exist() {
    let mut forecaster = Forecaster::new(
        seeded_store(),
        ForecastSettings {
            place: Some(PlaceId::from("elsewhere")),
            ..settings()
        },
    );

    let err = forecaster.run_cycle_at(now()).await.unwrap_err();
    assert!(matches!(err, CycleError::PlaceLookup { .. }));
}

#[tokio::test]
async fn test_place_listing_failure_aborts() {
    let mut forecaster = Forecaster::new(seeded_store().failing_fetches(), settings());

    let err = forecaster.run_cycle_at(now()).await.unwrap_err();
    assert!(matches!(err, CycleError::PlaceListing(_)));
}

#[tokio::test]
async fn test_write_failures_are_skipped() {
    let mut forecaster =
        Forecaster::new(seeded_store().failing_every_nth_create(10), settings());

    let report = forecaster.run_cycle_at(now()).await.unwrap();

    assert_eq!(
        report.places[0].outcome,
        PlaceOutcome::Completed {
            written: 152,
            failed_writes: 16,
            deleted: 0,
            failed_deletes: 0,
        }
    );
    assert_eq!(forecaster.store().forecasts_for(&room().id).len(), 152);
}

#[tokio::test]
async fn test_delete_failures_are_counted() {
    let store = seeded_store()
        .with_forecasts(vec![ForecastRecord {
            place_id: room().id,
            target_ts: now(),
            predicted_occupancy: 0.0,
            predicted_comfort_score: 1.0,
        }])
        .failing_deletes();
    let mut forecaster = Forecaster::new(store, settings());

    let report = forecaster.run_cycle_at(now()).await.unwrap();

    assert_eq!(
        report.places[0].outcome,
        PlaceOutcome::Completed {
            written: 168,
            failed_writes: 0,
            deleted: 0,
            failed_deletes: 1,
        }
    );
}

#[test]
#[serial]
fn test_settings_from_config() {
    let _place = ConfigGuard::new("PLACE_ID", "room9");
    let _trees = ConfigGuard::new("FORECAST_TREE_COUNT", "12");
    let _offset = ConfigGuard::new("FORECAST_INTERPRETATION_OFFSET", "+03:00");
    let _lookback = ConfigGuard::new("FORECAST_LOOKBACK_DAYS", "14");

    let settings = ForecastSettings::from_config().unwrap();

    assert_eq!(settings.place, Some(PlaceId::from("room9")));
    assert_eq!(settings.forest.tree_count, 12);
    assert_eq!(settings.lookback, Duration::days(14));
    assert_eq!(
        settings.interpretation_offset,
        FixedOffset::east_opt(3 * 3600).unwrap()
    );
    assert_eq!(settings.floor.hours, BusinessHours::default());
}

#[test]
#[serial]
fn test_settings_reject_inverted_floor_range() {
    let _min = ConfigGuard::new("FORECAST_FLOOR_MIN_FRACTION", "0.3");
    let _max = ConfigGuard::new("FORECAST_FLOOR_MAX_FRACTION", "0.2");

    assert!(ForecastSettings::from_config().is_err());
}
