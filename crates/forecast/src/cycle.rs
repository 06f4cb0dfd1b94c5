//! One forecast refresh: authenticate, pull history, train, predict a week
//! of hourly slots and replace the stored forecasts of every target place.

use crate::comfort::round2;
use crate::correlate;
use crate::features::{self, FeatureError};
use crate::forest::ForestParams;
use crate::smoothing::{self, BusinessHours, OccupancyFloor};
use crate::trainer::ForecastModel;
use chrono::{DateTime, Duration, FixedOffset, Timelike, Utc};
use common::config;
use common::timestamp;
use common::types::{ForecastRecord, Place, PlaceId, Reservation};
use logging::*;
use persistence::{RecordStore, StoreError};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fmt;
use std::result::Result;
use thiserror::Error;

pub const FORECAST_HORIZON_HOURS: usize = 168;

/// Immutable knobs of a forecaster, fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    /// `None` forecasts every active place.
    pub place: Option<PlaceId>,
    pub lookback: Duration,
    pub forest: ForestParams,
    pub floor: OccupancyFloor,
    pub floor_seed: u64,
    pub default_capacity: u32,
    pub interpretation_offset: FixedOffset,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        Self {
            place: None,
            lookback: Duration::days(30),
            forest: ForestParams::default(),
            floor: OccupancyFloor::default(),
            floor_seed: 7,
            default_capacity: 5,
            interpretation_offset: timestamp::utc_offset(),
        }
    }
}

impl ForecastSettings {
    pub fn from_config() -> anyhow::Result<Self> {
        let place = config::get("PLACE_ID").ok().map(PlaceId::new);
        let offset = timestamp::parse_offset(
            &config::get("FORECAST_INTERPRETATION_OFFSET").unwrap_or_default(),
        )?;
        let min_fraction: f64 = config::get_parsed("FORECAST_FLOOR_MIN_FRACTION")?;
        let max_fraction: f64 = config::get_parsed("FORECAST_FLOOR_MAX_FRACTION")?;
        if !(0.0..=1.0).contains(&min_fraction) || max_fraction < min_fraction {
            anyhow::bail!(
                "invalid floor fraction range: {} ..= {}",
                min_fraction,
                max_fraction
            );
        }

        Ok(Self {
            place,
            lookback: Duration::days(config::get_parsed("FORECAST_LOOKBACK_DAYS")?),
            forest: ForestParams {
                tree_count: config::get_parsed("FORECAST_TREE_COUNT")?,
                seed: config::get_parsed("FORECAST_SEED")?,
                ..ForestParams::default()
            },
            floor: OccupancyFloor {
                hours: BusinessHours {
                    start_hour: config::get_parsed("FORECAST_BUSINESS_START_HOUR")?,
                    end_hour: config::get_parsed("FORECAST_BUSINESS_END_HOUR")?,
                },
                min_fraction,
                max_fraction,
            },
            floor_seed: config::get_parsed("FORECAST_FLOOR_SEED")?,
            default_capacity: config::get_parsed("FORECAST_DEFAULT_CAPACITY")?,
            interpretation_offset: offset,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Authenticating,
    FetchingHistory,
    Training,
    Predicting,
    Persisting,
}

impl fmt::Display for CycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CycleState::Idle => "idle",
            CycleState::Authenticating => "authenticating",
            CycleState::FetchingHistory => "fetching_history",
            CycleState::Training => "training",
            CycleState::Predicting => "predicting",
            CycleState::Persisting => "persisting",
        };
        f.write_str(name)
    }
}

/// Reasons a whole cycle is abandoned before any place is processed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CycleError {
    #[error("authentication failed: {0}")]
    Authentication(StoreError),
    #[error("failed to resolve place {place}: {source}")]
    PlaceLookup { place: PlaceId, source: StoreError },
    #[error("failed to list active places: {0}")]
    PlaceListing(StoreError),
    #[error("no active place found")]
    NoActivePlace,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlaceOutcome {
    Completed {
        written: usize,
        failed_writes: usize,
        deleted: usize,
        failed_deletes: usize,
    },
    InsufficientData {
        available: usize,
        required: usize,
    },
    FetchFailed(StoreError),
    TrainingFailed(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct PlaceReport {
    pub place_id: PlaceId,
    pub outcome: PlaceOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CycleReport {
    pub started_at: DateTime<Utc>,
    pub horizon_start: DateTime<Utc>,
    pub places: Vec<PlaceReport>,
}

impl CycleReport {
    pub fn written(&self) -> usize {
        self.places
            .iter()
            .map(|p| match p.outcome {
                PlaceOutcome::Completed { written, .. } => written,
                _ => 0,
            })
            .sum()
    }
}

/// First slot of a horizon: the next full hour after `now`, in the
/// interpretation offset.
pub fn horizon_start(now: DateTime<Utc>, offset: &FixedOffset) -> DateTime<Utc> {
    let local = timestamp::interpret(&now, offset);
    let into_hour = Duration::minutes(i64::from(local.minute()))
        + Duration::seconds(i64::from(local.second()))
        + Duration::nanoseconds(i64::from(local.nanosecond()));
    now - into_hour + Duration::hours(1)
}

pub fn horizon(now: DateTime<Utc>, offset: &FixedOffset) -> Vec<DateTime<Utc>> {
    let start = horizon_start(now, offset);
    (0..FORECAST_HORIZON_HOURS as i64)
        .map(|h| start + Duration::hours(h))
        .collect()
}

/// Drives forecast cycles against a record store.
///
/// Cycles take `&mut self`, so one forecaster never runs two at once.
pub struct Forecaster<S> {
    store: S,
    settings: ForecastSettings,
    state: CycleState,
    transitions: Vec<CycleState>,
}

impl<S: RecordStore> Forecaster<S> {
    pub fn new(store: S, settings: ForecastSettings) -> Self {
        Self {
            store,
            settings,
            state: CycleState::Idle,
            transitions: Vec::new(),
        }
    }

    pub fn settings(&self) -> &ForecastSettings {
        &self.settings
    }

    pub fn state(&self) -> CycleState {
        self.state
    }

    /// States entered during the most recent cycle, in order.
    pub fn transitions(&self) -> &[CycleState] {
        &self.transitions
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub async fn run_cycle(&mut self) -> Result<CycleReport, CycleError> {
        self.run_cycle_at(Utc::now()).await
    }

    /// Runs a cycle as if the current time were `now`.
    pub async fn run_cycle_at(&mut self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        let log = DEFAULT.new(o!("function" => "run_cycle"));
        info!(log, "start"; "now" => %now);

        self.transitions.clear();
        let result = self.execute(now).await;
        self.enter(CycleState::Idle);

        match &result {
            Ok(report) => info!(log, "finished";
                "places" => report.places.len(),
                "written" => report.written(),
            ),
            Err(e) => error!(log, "aborted"; "error" => %e),
        }
        result
    }

    fn enter(&mut self, next: CycleState) {
        trace!(DEFAULT, "state transition"; "from" => %self.state, "to" => %next);
        self.state = next;
        self.transitions.push(next);
    }

    async fn execute(&mut self, now: DateTime<Utc>) -> Result<CycleReport, CycleError> {
        self.enter(CycleState::Authenticating);
        self.store
            .authenticate()
            .await
            .map_err(CycleError::Authentication)?;

        let places = self.resolve_places().await?;
        let horizon_start = horizon_start(now, &self.settings.interpretation_offset);

        let mut reports = Vec::with_capacity(places.len());
        for place in &places {
            let outcome = self.forecast_place(place, now).await;
            reports.push(PlaceReport {
                place_id: place.id.clone(),
                outcome,
            });
        }

        Ok(CycleReport {
            started_at: now,
            horizon_start,
            places: reports,
        })
    }

    async fn resolve_places(&self) -> Result<Vec<Place>, CycleError> {
        if let Some(id) = &self.settings.place {
            let place = self
                .store
                .get_place(id)
                .await
                .map_err(|source| CycleError::PlaceLookup {
                    place: id.clone(),
                    source,
                })?;
            return Ok(vec![place]);
        }

        let places = self
            .store
            .list_active_places()
            .await
            .map_err(CycleError::PlaceListing)?;
        if places.is_empty() {
            return Err(CycleError::NoActivePlace);
        }
        Ok(places)
    }

    async fn forecast_place(&mut self, place: &Place, now: DateTime<Utc>) -> PlaceOutcome {
        let log = DEFAULT.new(o!(
            "function" => "forecast_place",
            "place" => place.id.to_string(),
        ));

        self.enter(CycleState::FetchingHistory);
        let since = now - self.settings.lookback;
        let readings = match self.store.list_readings_since(&place.id, since).await {
            Ok(v) => v,
            Err(e) => {
                warn!(log, "failed to fetch readings"; "error" => %e);
                return PlaceOutcome::FetchFailed(e);
            }
        };
        let reservations = match self.store.list_reservations(&place.id).await {
            Ok(v) => v,
            Err(e) => {
                warn!(log, "failed to fetch reservations"; "error" => %e);
                return PlaceOutcome::FetchFailed(e);
            }
        };
        debug!(log, "history fetched";
            "readings" => readings.len(),
            "reservations" => reservations.len(),
        );

        let table = match features::build(
            &readings,
            &reservations,
            &self.settings.interpretation_offset,
        ) {
            Ok(table) => table,
            Err(FeatureError::InsufficientData {
                available,
                required,
            }) => {
                info!(log, "skipped: insufficient data";
                    "available" => available,
                    "required" => required,
                );
                return PlaceOutcome::InsufficientData {
                    available,
                    required,
                };
            }
        };

        self.enter(CycleState::Training);
        let params = self.settings.forest;
        let model = match tokio::task::spawn_blocking(move || {
            ForecastModel::train(&table, &params)
        })
        .await
        {
            Ok(Ok(model)) => model,
            Ok(Err(e)) => {
                error!(log, "training failed"; "error" => %e);
                return PlaceOutcome::TrainingFailed(e.to_string());
            }
            Err(e) => {
                error!(log, "training task failed"; "error" => %e);
                return PlaceOutcome::TrainingFailed(e.to_string());
            }
        };

        self.enter(CycleState::Predicting);
        let records = self.predict(&model, place, &reservations, now);

        self.enter(CycleState::Persisting);
        self.replace_forecasts(&place.id, &records, &log).await
    }

    /// 168 hourly records: occupancy first (booked count, else regressor),
    /// smoothed and floored, then conditions given that occupancy.
    pub fn predict(
        &self,
        model: &ForecastModel,
        place: &Place,
        reservations: &[Reservation],
        now: DateTime<Utc>,
    ) -> Vec<ForecastRecord> {
        let offset = &self.settings.interpretation_offset;
        let slots = horizon(now, offset);
        let local: Vec<_> = slots
            .iter()
            .map(|at| timestamp::interpret(at, offset))
            .collect();
        let calendar: Vec<(u32, u32)> = slots
            .iter()
            .map(|at| features::calendar(at, offset))
            .collect();

        let raw: Vec<f64> = slots
            .iter()
            .zip(&calendar)
            .map(|(at, (hour, day))| match correlate::occupant_count(*at, reservations) {
                0 => model.predict_occupancy(*hour, *day),
                booked => f64::from(booked),
            })
            .collect();

        let mut occupancy = smoothing::smooth(&raw);
        let mut rng = StdRng::seed_from_u64(self.settings.floor_seed);
        self.settings.floor.apply(
            &mut occupancy,
            &local,
            place.capacity_or(self.settings.default_capacity),
            &mut rng,
        );

        slots
            .iter()
            .zip(&calendar)
            .zip(&occupancy)
            .map(|((at, (hour, day)), occupants)| {
                let conditions = model.predict_conditions(*hour, *day, *occupants);
                ForecastRecord {
                    place_id: place.id.clone(),
                    target_ts: *at,
                    predicted_occupancy: round2(*occupants),
                    predicted_comfort_score: conditions.comfort_score(),
                }
            })
            .collect()
    }

    /// Deletes the stored forecasts of `place`, then writes `records`.
    /// Individual failures are logged and counted, never retried.
    async fn replace_forecasts(
        &self,
        place: &PlaceId,
        records: &[ForecastRecord],
        log: &Logger,
    ) -> PlaceOutcome {
        let (mut deleted, mut failed_deletes) = (0, 0);
        match self.store.list_forecast_ids(place).await {
            Ok(ids) => {
                for id in ids {
                    match self.store.delete_forecast(&id).await {
                        Ok(()) => deleted += 1,
                        Err(e) => {
                            warn!(log, "failed to delete forecast"; "id" => %id, "error" => %e);
                            failed_deletes += 1;
                        }
                    }
                }
            }
            Err(e) => warn!(log, "failed to list old forecasts"; "error" => %e),
        }

        let (mut written, mut failed_writes) = (0, 0);
        for record in records {
            match self.store.create_forecast(record).await {
                Ok(()) => written += 1,
                Err(e) => {
                    warn!(log, "failed to write forecast";
                        "target_ts" => %record.target_ts,
                        "error" => %e,
                    );
                    failed_writes += 1;
                }
            }
        }

        info!(log, "forecasts replaced";
            "deleted" => deleted,
            "failed_deletes" => failed_deletes,
            "written" => written,
            "failed_writes" => failed_writes,
        );
        PlaceOutcome::Completed {
            written,
            failed_writes,
            deleted,
            failed_deletes,
        }
    }
}

#[cfg(test)]
mod tests;
