use super::*;
use crate::{Co2Sample, EnvSample};
use chrono::TimeZone;
use common::config::ConfigGuard;
use persistence::memory::MemoryStore;
use serial_test::serial;
use std::collections::VecDeque;

/// Replays prepared samples; `None` entries fail the read.
struct Scripted(VecDeque<Option<RawSample>>);

impl SensorSource for Scripted {
    fn read(&mut self, _at: DateTime<Utc>) -> Result<RawSample> {
        match self.0.pop_front().flatten() {
            Some(sample) => Ok(sample),
            None => anyhow::bail!("i2c bus timeout"),
        }
    }
}

fn at(second: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 6, 9, 0, second).unwrap()
}

fn full(gas_ohms: f64) -> RawSample {
    RawSample {
        co2: Some(Co2Sample {
            co2_ppm: 612.0,
            temp_c: 22.456,
            rh_percent: 41.234,
        }),
        env: Some(EnvSample {
            temp_c: 25.0,
            rh_percent: 35.0,
            gas_ohms,
        }),
        motion: true,
    }
}

fn settings(warmup: usize, history: usize) -> SensingSettings {
    SensingSettings {
        warmup_skip_count: warmup,
        gas_history_len: history,
        ..SensingSettings::new(PlaceId::from("room1"))
    }
}

fn agent(
    samples: Vec<Option<RawSample>>,
    warmup: usize,
) -> SensingAgent<Scripted, MemoryStore> {
    SensingAgent::new(
        Scripted(samples.into()),
        MemoryStore::new(),
        settings(warmup, 3),
    )
}

#[test]
fn test_fuse_prefers_co2_sensor_climate() {
    let mut agent = agent(vec![], 0);
    let reading = agent.fuse(&full(20_000.0), at(0));

    assert_eq!(reading.temp_c, Some(22.46));
    assert_eq!(reading.rh_percent, Some(41.23));
    assert_eq!(reading.co2_ppm, Some(612.0));
    assert_eq!(reading.voc_index, Some(20.0));
    assert!(reading.pir_occupied);
    assert_eq!(reading.comfort_score, Some(1.0));
}

#[test]
fn test_fuse_falls_back_to_env_sensor() {
    let mut agent = agent(vec![], 0);
    let sample = RawSample {
        co2: None,
        ..full(30_000.0)
    };
    let reading = agent.fuse(&sample, at(0));

    assert_eq!(reading.temp_c, Some(25.0));
    assert_eq!(reading.rh_percent, Some(35.0));
    assert_eq!(reading.co2_ppm, None);
    // no CO2, no comfort
    assert_eq!(reading.comfort_score, None);
}

#[test]
fn test_gas_moving_average() {
    let mut agent = agent(vec![], 0);
    let vocs: Vec<f64> = [10_000.0, 20_000.0, 30_000.0, 70_000.0]
        .iter()
        .map(|g| agent.fuse(&full(*g), at(0)).voc_index.unwrap())
        .collect();
    // window of three
    assert_eq!(vocs, vec![10.0, 15.0, 20.0, 40.0]);
}

#[tokio::test]
async fn test_warmup_then_write() {
    let samples = (0..4).map(|_| Some(full(20_000.0))).collect();
    let mut agent = agent(samples, 2);

    assert_eq!(
        agent.tick_at(at(0)).await,
        TickOutcome::WarmingUp { remaining: 1 }
    );
    assert_eq!(
        agent.tick_at(at(5)).await,
        TickOutcome::WarmingUp { remaining: 0 }
    );
    assert!(matches!(agent.tick_at(at(10)).await, TickOutcome::Written(_)));
    assert!(matches!(agent.tick_at(at(15)).await, TickOutcome::Written(_)));

    let stored = agent.store().readings_for(&PlaceId::from("room1"));
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0].recorded_at, at(10));
}

#[tokio::test]
async fn test_synthetic_meetings_are_stored() {
    let mut agent = SensingAgent::new(
        crate::SyntheticSource::new(PlaceId::from("room1"), 4, 1.0, 7),
        MemoryStore::new(),
        settings(0, 3),
    );

    assert!(matches!(agent.tick_at(at(0)).await, TickOutcome::Written(_)));
    // still inside the same meeting
    assert!(matches!(agent.tick_at(at(5)).await, TickOutcome::Written(_)));

    let booked = agent.store().reservations_for(&PlaceId::from("room1"));
    assert_eq!(booked.len(), 1);
    assert_eq!(booked[0].start_ts, at(0));
    assert!(booked[0].contains(at(5)));
    assert_eq!(agent.store().readings_for(&PlaceId::from("room1")).len(), 2);
}

#[tokio::test]
async fn test_read_failure_is_skipped() {
    let mut agent = agent(vec![None, Some(full(20_000.0))], 0);

    assert!(matches!(
        agent.tick_at(at(0)).await,
        TickOutcome::ReadFailed(_)
    ));
    assert!(matches!(agent.tick_at(at(5)).await, TickOutcome::Written(_)));
}

#[tokio::test]
async fn test_write_failure_is_reported() {
    let mut agent = SensingAgent::new(
        Scripted(vec![Some(full(20_000.0)), Some(full(20_000.0))].into()),
        MemoryStore::new().failing_every_nth_create(1),
        settings(0, 3),
    );

    assert!(matches!(
        agent.tick_at(at(0)).await,
        TickOutcome::WriteFailed(_)
    ));
    assert!(matches!(
        agent.tick_at(at(5)).await,
        TickOutcome::WriteFailed(_)
    ));
}

#[test]
#[serial]
fn test_settings_from_config() {
    let _place = ConfigGuard::new("PLACE_ID", "room7");
    let _interval = ConfigGuard::new("SENSING_INTERVAL", "1m 30s");

    let settings = SensingSettings::from_config().unwrap();

    assert_eq!(settings.place_id, PlaceId::from("room7"));
    assert_eq!(settings.interval, Duration::from_secs(90));
    assert_eq!(settings.warmup_skip_count, 30);
    assert_eq!(settings.gas_history_len, 10);
}
