#![deny(warnings)]

pub mod agent;
pub mod synthetic;

pub use agent::{SensingAgent, SensingSettings, TickOutcome};
pub use synthetic::{MeetingPlanner, RoomModel, SyntheticSource};

type Result<T> = anyhow::Result<T>;

use chrono::{DateTime, Utc};
use common::types::Reservation;

/// CO2 sensor triple (NDIR sensors report temperature and humidity too).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Co2Sample {
    pub co2_ppm: f64,
    pub temp_c: f64,
    pub rh_percent: f64,
}

/// Environment sensor: temperature, humidity and gas resistance in ohms.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvSample {
    pub temp_c: f64,
    pub rh_percent: f64,
    pub gas_ohms: f64,
}

/// One poll of every sensor on the board. A sensor with no fresh data
/// leaves its slot empty.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawSample {
    pub co2: Option<Co2Sample>,
    pub env: Option<EnvSample>,
    pub motion: bool,
}

/// Hardware (or simulated) sensor board.
pub trait SensorSource: Send {
    /// An error means the poll produced nothing usable.
    fn read(&mut self, at: DateTime<Utc>) -> Result<RawSample>;

    /// A booking made since the last call, for sources that also drive
    /// the room's calendar. Real boards have none.
    fn take_booking(&mut self) -> Option<Reservation> {
        None
    }
}
