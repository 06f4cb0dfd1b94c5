use crate::dataset::Dataset;
use anyhow::Result;
use chrono::{DateTime, Utc};
use common::types::ForecastRecord;
use forecast::{CycleReport, ForecastSettings, Forecaster};
use logging::*;
use persistence::memory::MemoryStore;

/// Runs one cycle against an in-memory copy of `dataset` and returns the
/// report with every forecast record it left behind.
pub async fn run_forecast(
    dataset: &Dataset,
    settings: ForecastSettings,
    now: DateTime<Utc>,
) -> Result<(CycleReport, Vec<ForecastRecord>)> {
    let log = DEFAULT.new(o!("function" => "run_forecast"));

    let mut store = MemoryStore::new()
        .with_readings(dataset.readings.iter().cloned())
        .with_reservations(dataset.reservations.iter().cloned());
    for place in &dataset.places {
        store = store.with_place(place.clone());
    }

    let mut forecaster = Forecaster::new(store, settings);
    let report = forecaster.run_cycle_at(now).await?;
    info!(log, "cycle finished"; "written" => report.written());

    let store = forecaster.into_store();
    let records = report
        .places
        .iter()
        .flat_map(|p| store.forecasts_for(&p.place_id))
        .collect();

    Ok((report, records))
}

#[cfg(test)]
mod tests;
