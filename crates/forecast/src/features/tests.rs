use super::*;
use chrono::{Duration, TimeZone};
use common::timestamp::utc_offset;
use common::types::PlaceId;

fn monday_nine() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, 0).unwrap()
}

fn reading(at: DateTime<Utc>, temp: Option<f64>, co2: Option<f64>) -> SensorReading {
    SensorReading {
        place_id: PlaceId::from("room1"),
        recorded_at: at,
        temp_c: temp,
        rh_percent: Some(45.0),
        co2_ppm: co2,
        voc_index: None,
        pir_occupied: false,
        comfort_score: None,
    }
}

fn series(n: usize) -> Vec<SensorReading> {
    (0..n)
        .map(|i| {
            reading(
                monday_nine() + Duration::minutes(10 * i as i64),
                Some(22.0),
                Some(500.0),
            )
        })
        .collect()
}

#[test]
fn test_fill_forward_then_backward() {
    let filled = fill(vec![None, Some(1.0), None, None, Some(4.0), None], 9.0);
    assert_eq!(filled, vec![1.0, 1.0, 1.0, 1.0, 4.0, 4.0]);
}

#[test]
fn test_fill_all_missing_uses_default() {
    assert_eq!(fill(vec![None, None], 9.0), vec![9.0, 9.0]);
    assert!(fill(vec![], 9.0).is_empty());
}

#[test]
fn test_gaps_take_the_next_later_value() {
    let mut readings = series(60);
    readings[20].temp_c = Some(20.0);
    readings[21].temp_c = None;
    readings[22].temp_c = Some(24.0);
    readings[58].temp_c = Some(25.0);
    readings[59].temp_c = None;

    let table = build(&readings, &[], &utc_offset()).unwrap();
    let rows = table.rows();

    assert_eq!(rows[21].temp_c, 24.0);
    // nothing later: the latest earlier value
    assert_eq!(rows[59].temp_c, 25.0);
}

#[test]
fn test_insufficient_data() {
    let err = build(&series(49), &[], &utc_offset()).unwrap_err();
    assert_eq!(
        err,
        FeatureError::InsufficientData {
            available: 49,
            required: MIN_TRAINING_ROWS
        }
    );
}

#[test]
fn test_one_row_per_reading_with_gaps() {
    let mut readings = series(60);
    readings[0].temp_c = None;
    readings[10].co2_ppm = None;
    readings[11].co2_ppm = None;
    readings[59].temp_c = None;

    let table = build(&readings, &[], &utc_offset()).unwrap();

    assert_eq!(table.len(), 60);
    assert!(table.rows().iter().all(|r| r.temp_c == 22.0));
    assert!(table.rows().iter().all(|r| r.co2_ppm == 500.0));
    assert!(table.rows().iter().all(|r| r.voc_index == DEFAULT_VOC_INDEX));
}

#[test]
fn test_rows_are_ordered_and_correlated() {
    let mut readings = series(60);
    readings.reverse();
    let reservations = vec![Reservation {
        place_id: PlaceId::from("room1"),
        start_ts: monday_nine(),
        end_ts: monday_nine() + Duration::hours(1),
        attendee_count: 4,
    }];

    let table = build(&readings, &reservations, &utc_offset()).unwrap();
    let rows = table.rows();

    // 09:00..09:50 are booked, 10:00 is the exclusive end
    assert!(rows[..6].iter().all(|r| r.occupant_count == 4));
    assert_eq!(rows[6].occupant_count, 0);
    assert_eq!((rows[0].hour, rows[0].day_of_week), (9, 0));
    assert_eq!(rows[6].hour, 10);
}

#[test]
fn test_calendar_uses_interpretation_offset() {
    // Sunday 23:30 UTC is Monday 02:30 at +03:00
    let at = Utc.with_ymd_and_hms(2024, 5, 5, 23, 30, 0).unwrap();
    assert_eq!(calendar(&at, &utc_offset()), (23, 6));
    let istanbul = FixedOffset::east_opt(3 * 3600).unwrap();
    assert_eq!(calendar(&at, &istanbul), (2, 0));
}

#[test]
fn test_feature_matrix_shapes() {
    let table = build(&series(50), &[], &utc_offset()).unwrap();
    assert_eq!(table.features(true).dim(), (50, 3));
    assert_eq!(table.features(false).dim(), (50, 2));
    assert_eq!(table.target(Target::Co2Ppm).len(), 50);
    assert!(table.target(Target::Occupancy).iter().all(|v| *v == 0.0));
}
