#![deny(warnings)]

pub mod comfort;
pub mod correlate;
pub mod cycle;
pub mod features;
pub mod forest;
pub mod smoothing;
pub mod trainer;

pub use cycle::{CycleError, CycleReport, CycleState, ForecastSettings, Forecaster, PlaceOutcome};

type Result<T> = anyhow::Result<T>;

use chrono::Utc as TZ;
use common::config;
use logging::*;
use persistence::RecordStore;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

const DEFAULT_CRON: &str = "0 0 0 * * *";

/// Runs forecast cycles on the configured cron schedule, forever.
///
/// The forecaster sits behind a mutex, so a cycle that overruns its slot
/// delays the next one instead of overlapping it.
pub async fn run<S: RecordStore + 'static>(forecaster: Forecaster<S>) {
    let log = DEFAULT.new(o!("function" => "forecast::run"));
    info!(log, "initializing forecast cron job");

    let schedule = get_cron_schedule("FORECAST_CRON_SCHEDULE", DEFAULT_CRON);
    let run_on_startup = config::get_parsed("FORECAST_RUN_ON_STARTUP").unwrap_or(true);

    let forecaster = Arc::new(Mutex::new(forecaster));
    let job = move || {
        let forecaster = Arc::clone(&forecaster);
        async move {
            let report = forecaster.lock().await.run_cycle().await?;
            for place in &report.places {
                debug!(DEFAULT, "place outcome";
                    "place" => %place.place_id,
                    "outcome" => ?place.outcome,
                );
            }
            Ok::<_, anyhow::Error>(())
        }
    };

    if run_on_startup {
        execute(&job, "forecast").await;
    }
    cronjob(schedule, job, "forecast").await;
}

/// Reads a cron schedule from config, falling back to `default` when the
/// configured one is missing or does not parse.
fn get_cron_schedule(name: &str, default: &str) -> cron::Schedule {
    let log = DEFAULT.new(o!("function" => "get_cron_schedule", "name" => name.to_owned()));
    let cron_conf = config::get(name).unwrap_or_else(|_| default.to_string());

    match cron_conf.parse() {
        Ok(s) => {
            info!(log, "cron schedule configured"; "schedule" => &cron_conf);
            s
        }
        Err(e) => {
            error!(log, "failed to parse cron schedule, using default";
                   "error" => ?e, "schedule" => &cron_conf, "default" => default);
            default.parse().unwrap()
        }
    }
}

async fn execute<F, Fut>(func: &F, name: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let log = DEFAULT.new(o!("function" => "run", "name" => name.to_owned()));
    info!(log, "executing scheduled task");

    match func().await {
        Ok(_) => info!(log, "success"),
        Err(err) => error!(log, "failure"; "error" => ?err),
    }
}

async fn cronjob<F, Fut>(schedule: cron::Schedule, func: F, name: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<()>>,
{
    let log = DEFAULT.new(o!("function" => "cronjob", "name" => name.to_owned()));
    info!(log, "starting cron job");

    for (iteration, next) in schedule.upcoming(TZ).enumerate() {
        let now = TZ::now();
        debug!(log, "cron iteration"; "iteration" => iteration, "next" => %next, "now" => %now);

        if next <= now {
            warn!(log, "execution time already passed, skipping to next iteration";
                "next" => %next,
                "now" => %now,
                "iteration" => iteration
            );
            continue;
        }

        // sleep in slices of at most a minute so clock jumps are noticed
        loop {
            let now = TZ::now();
            if now >= next {
                break;
            }
            let remaining = match (next - now).to_std() {
                Ok(d) => d,
                Err(_) => break,
            };
            if remaining.as_secs() > 300 {
                trace!(log, "still waiting for next execution";
                    "remaining_seconds" => remaining.as_secs(),
                    "next_time" => %next
                );
            }
            tokio::time::sleep(remaining.min(std::time::Duration::from_secs(60))).await;
        }

        execute(&func, name).await;
    }
}
