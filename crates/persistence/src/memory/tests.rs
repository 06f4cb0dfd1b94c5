use super::*;
use chrono::{Duration, TimeZone};

fn place(id: &str, active: bool) -> Place {
    Place {
        id: PlaceId::from(id),
        name: id.to_uppercase(),
        capacity: Some(4),
        is_active: active,
    }
}

fn forecast(place: &str, hour: u32) -> ForecastRecord {
    ForecastRecord {
        place_id: PlaceId::from(place),
        target_ts: Utc.with_ymd_and_hms(2024, 5, 6, hour, 0, 0).unwrap(),
        predicted_occupancy: 1.0,
        predicted_comfort_score: 0.8,
    }
}

#[tokio::test]
async fn test_lists_only_active_places() {
    let store = MemoryStore::new()
        .with_place(place("a", true))
        .with_place(place("b", false));

    let places = store.list_active_places().await.unwrap();
    assert_eq!(places.len(), 1);
    assert_eq!(places[0].id.as_str(), "a");
    assert!(store.get_place(&PlaceId::from("b")).await.is_ok());
    assert!(matches!(
        store.get_place(&PlaceId::from("zz")).await,
        Err(StoreError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_readings_since_filters_and_orders() {
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 9, 0, 0).unwrap();
    let reading = |minutes: i64| SensorReading {
        place_id: PlaceId::from("a"),
        recorded_at: base + Duration::minutes(minutes),
        temp_c: None,
        rh_percent: None,
        co2_ppm: Some(400.0 + minutes as f64),
        voc_index: None,
        pir_occupied: false,
        comfort_score: None,
    };
    let store = MemoryStore::new().with_readings(vec![reading(20), reading(-10), reading(5)]);

    let readings = store
        .list_readings_since(&PlaceId::from("a"), base)
        .await
        .unwrap();
    let co2: Vec<f64> = readings.iter().filter_map(|r| r.co2_ppm).collect();
    assert_eq!(co2, vec![405.0, 420.0]);
}

#[tokio::test]
async fn test_delete_and_create_forecasts() {
    let store = MemoryStore::new().with_forecasts(vec![forecast("a", 9), forecast("b", 9)]);
    let id = PlaceId::from("a");

    for fid in store.list_forecast_ids(&id).await.unwrap() {
        store.delete_forecast(&fid).await.unwrap();
    }
    store.create_forecast(&forecast("a", 11)).await.unwrap();
    store.create_forecast(&forecast("a", 10)).await.unwrap();

    let hours: Vec<_> = store
        .forecasts_for(&id)
        .iter()
        .map(|f| f.target_ts.format("%H").to_string())
        .collect();
    assert_eq!(hours, vec!["10", "11"]);
    assert_eq!(store.forecasts_for(&PlaceId::from("b")).len(), 1);
}

#[tokio::test]
async fn test_injected_faults() {
    let mut store = MemoryStore::new()
        .with_forecasts(vec![forecast("a", 9)])
        .rejecting_auth()
        .failing_deletes()
        .failing_every_nth_create(2);

    assert!(store.authenticate().await.is_err());
    assert!(!store.is_authenticated());

    let ids = store.list_forecast_ids(&PlaceId::from("a")).await.unwrap();
    assert!(store.delete_forecast(&ids[0]).await.is_err());

    assert!(store.create_forecast(&forecast("a", 10)).await.is_ok());
    assert!(store.create_forecast(&forecast("a", 11)).await.is_err());
    assert!(store.create_forecast(&forecast("a", 12)).await.is_ok());
    assert_eq!(store.forecasts_for(&PlaceId::from("a")).len(), 3);
}

#[tokio::test]
async fn test_failing_fetches() {
    let store = MemoryStore::new()
        .with_place(place("a", true))
        .failing_fetches();

    assert!(matches!(
        store.list_active_places().await,
        Err(StoreError::Network(_))
    ));
}

#[tokio::test]
async fn test_created_reservations_are_listed() {
    let store = MemoryStore::new();
    let start = Utc.with_ymd_and_hms(2024, 5, 6, 10, 0, 0).unwrap();
    let reservation = Reservation {
        place_id: PlaceId::from("a"),
        start_ts: start,
        end_ts: start + Duration::hours(1),
        attendee_count: 3,
    };

    store.create_reservation(&reservation).await.unwrap();

    assert_eq!(
        store.list_reservations(&PlaceId::from("a")).await.unwrap(),
        vec![reservation.clone()]
    );
    assert_eq!(store.reservations_for(&PlaceId::from("a")), vec![reservation]);
    assert!(store.reservations_for(&PlaceId::from("b")).is_empty());
}
