#![deny(warnings)]

use common::config;
use forecast::{ForecastSettings, Forecaster};
use logging::*;
use persistence::{StoreClient, StoreClientConfig};
use sensing::synthetic::BOOKING_CHANCE;
use sensing::{SensingAgent, SensingSettings, SyntheticSource};
use std::time::Duration;

type Result<T> = anyhow::Result<T>;

/// Planning step the synthetic booking chance is defined for.
const BOOKING_STEP: Duration = Duration::from_secs(600);

#[tokio::main]
async fn main() {
    let log = DEFAULT.new(o!("function" => "main"));
    info!(log, "Starting up");

    match new_forecaster() {
        Ok(forecaster) => {
            tokio::spawn(forecast::run(forecaster));
        }
        Err(e) => error!(log, "forecasting disabled"; "error" => %e),
    }

    if config::get_parsed("SENSING_ENABLED").unwrap_or(false) {
        match new_sensing_agent() {
            Ok(agent) => {
                tokio::spawn(async move {
                    if let Err(e) = agent.run().await {
                        error!(DEFAULT, "sensing stopped"; "error" => %e);
                    }
                });
            }
            Err(e) => error!(log, "sensing disabled"; "error" => %e),
        }
    }

    tokio::signal::ctrl_c().await.ok();
    info!(log, "Shutting down");
}

fn new_forecaster() -> Result<Forecaster<StoreClient>> {
    let client = StoreClient::new(StoreClientConfig::from_config()?);
    Ok(Forecaster::new(client, ForecastSettings::from_config()?))
}

fn new_sensing_agent() -> Result<SensingAgent<SyntheticSource, StoreClient>> {
    let settings = SensingSettings::from_config()?;
    let source = match config::get("SENSING_SOURCE")?.as_str() {
        "synthetic" => synthetic_source(&settings)?,
        other => anyhow::bail!("unsupported sensor source: {}", other),
    };
    let client = StoreClient::new(StoreClientConfig::from_config()?);
    Ok(SensingAgent::new(source, client, settings))
}

fn synthetic_source(settings: &SensingSettings) -> Result<SyntheticSource> {
    let capacity: u32 = config::get_parsed("FORECAST_DEFAULT_CAPACITY")?;
    let seed: u64 = config::get_parsed("FORECAST_SEED")?;
    Ok(SyntheticSource::new(
        settings.place_id.clone(),
        capacity,
        chance_per_read(settings.interval),
        seed,
    ))
}

/// Scales the per-slot booking chance down to one read interval.
fn chance_per_read(interval: Duration) -> f64 {
    let reads_per_step = BOOKING_STEP.as_secs_f64() / interval.as_secs_f64().max(1.0);
    1.0 - (1.0 - BOOKING_CHANCE).powf(1.0 / reads_per_step.max(1.0))
}
