use crate::{RawSample, Result, SensorSource};
use chrono::{DateTime, Utc};
use common::config;
use common::types::{PlaceId, SensorReading};
use forecast::comfort;
use logging::*;
use persistence::{RecordStore, StoreError};
use std::collections::VecDeque;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub struct SensingSettings {
    pub place_id: PlaceId,
    pub interval: Duration,
    /// Samples taken right after power-up are only logged.
    pub warmup_skip_count: usize,
    /// Length of the gas-resistance moving average.
    pub gas_history_len: usize,
}

impl SensingSettings {
    pub fn new(place_id: PlaceId) -> Self {
        Self {
            place_id,
            interval: Duration::from_secs(5),
            warmup_skip_count: 30,
            gas_history_len: 10,
        }
    }

    pub fn from_config() -> Result<Self> {
        Ok(Self {
            place_id: PlaceId::new(config::get("PLACE_ID")?),
            interval: config::get_duration("SENSING_INTERVAL")?,
            warmup_skip_count: config::get_parsed("SENSING_WARMUP_SKIP_COUNT")?,
            gas_history_len: config::get_parsed("SENSING_GAS_HISTORY_LEN")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    WarmingUp { remaining: usize },
    Written(SensorReading),
    WriteFailed(StoreError),
    ReadFailed(String),
}

/// Polls a sensor board and stores one fused reading per tick.
pub struct SensingAgent<S, R> {
    source: S,
    store: R,
    settings: SensingSettings,
    gas_history: VecDeque<f64>,
    samples_seen: usize,
}

impl<S: SensorSource, R: RecordStore> SensingAgent<S, R> {
    pub fn new(source: S, store: R, settings: SensingSettings) -> Self {
        Self {
            source,
            store,
            gas_history: VecDeque::with_capacity(settings.gas_history_len.max(1)),
            settings,
            samples_seen: 0,
        }
    }

    pub fn store(&self) -> &R {
        &self.store
    }

    /// Merges one raw sample into a reading.
    ///
    /// Temperature and humidity come from the CO2 sensor when it has data,
    /// else from the environment sensor. VOC is the moving average of gas
    /// resistance in kilo-ohms. Comfort needs a CO2 value.
    pub fn fuse(&mut self, sample: &RawSample, at: DateTime<Utc>) -> SensorReading {
        let temp_c = sample
            .co2
            .map(|c| c.temp_c)
            .or(sample.env.map(|e| e.temp_c));
        let rh_percent = sample
            .co2
            .map(|c| c.rh_percent)
            .or(sample.env.map(|e| e.rh_percent));
        let co2_ppm = sample.co2.map(|c| c.co2_ppm);
        let voc_index = sample.env.map(|e| self.smoothed_voc(e.gas_ohms / 1000.0));

        let comfort_score = match (temp_c, co2_ppm) {
            (Some(_), Some(_)) => Some(comfort::live_score(
                temp_c, rh_percent, co2_ppm, voc_index,
            )),
            _ => None,
        };

        SensorReading {
            place_id: self.settings.place_id.clone(),
            recorded_at: at,
            temp_c: temp_c.map(comfort::round2),
            rh_percent: rh_percent.map(comfort::round2),
            co2_ppm,
            voc_index: voc_index.map(comfort::round2),
            pir_occupied: sample.motion,
            comfort_score,
        }
    }

    fn smoothed_voc(&mut self, voc: f64) -> f64 {
        let len = self.settings.gas_history_len.max(1);
        while self.gas_history.len() >= len {
            self.gas_history.pop_front();
        }
        self.gas_history.push_back(voc);
        self.gas_history.iter().sum::<f64>() / self.gas_history.len() as f64
    }

    /// One poll-fuse-store round, as if it were `at`.
    pub async fn tick_at(&mut self, at: DateTime<Utc>) -> TickOutcome {
        let log = DEFAULT.new(o!(
            "function" => "sensing_tick",
            "place" => self.settings.place_id.to_string(),
        ));

        let sample = match self.source.read(at) {
            Ok(sample) => sample,
            Err(e) => {
                warn!(log, "sensor read failed"; "error" => %e);
                return TickOutcome::ReadFailed(e.to_string());
            }
        };
        if let Some(booking) = self.source.take_booking() {
            match self.store.create_reservation(&booking).await {
                Ok(()) => info!(log, "meeting booked";
                    "start" => %booking.start_ts,
                    "end" => %booking.end_ts,
                    "attendees" => booking.attendee_count,
                ),
                Err(e) => warn!(log, "failed to store reservation"; "error" => %e),
            }
        }

        let reading = self.fuse(&sample, at);
        self.samples_seen += 1;

        debug!(log, "sample";
            "temp_c" => ?reading.temp_c,
            "rh_percent" => ?reading.rh_percent,
            "co2_ppm" => ?reading.co2_ppm,
            "voc_index" => ?reading.voc_index,
            "pir" => reading.pir_occupied,
            "comfort" => ?reading.comfort_score,
        );

        if self.samples_seen <= self.settings.warmup_skip_count {
            let remaining = self.settings.warmup_skip_count - self.samples_seen;
            trace!(log, "warming up"; "remaining" => remaining);
            return TickOutcome::WarmingUp { remaining };
        }

        match self.store.create_reading(&reading).await {
            Ok(()) => TickOutcome::Written(reading),
            Err(e) => {
                warn!(log, "failed to store reading"; "error" => %e);
                TickOutcome::WriteFailed(e)
            }
        }
    }

    /// Authenticates, then ticks every `interval` until the task is dropped.
    pub async fn run(mut self) -> Result<()> {
        let log = DEFAULT.new(o!("function" => "sensing::run"));
        self.store.authenticate().await?;
        info!(log, "sensing started";
            "place" => %self.settings.place_id,
            "interval" => ?self.settings.interval,
        );

        let mut ticker = tokio::time::interval(self.settings.interval.max(Duration::from_millis(1)));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            self.tick_at(Utc::now()).await;
        }
    }
}

#[cfg(test)]
mod tests;
