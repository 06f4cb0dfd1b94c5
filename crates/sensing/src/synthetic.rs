//! A simulated room: random meetings during office hours and sensor values
//! that rise with the number of people inside.

use crate::{Co2Sample, EnvSample, RawSample, Result, SensorSource};
use chrono::{DateTime, Duration, Timelike, Utc};
use common::types::{PlaceId, Reservation};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const OFFICE_START_HOUR: u32 = 8;
pub const OFFICE_END_HOUR: u32 = 19;
/// Chance that an idle room gets booked, per planning step.
pub const BOOKING_CHANCE: f64 = 0.2;
const DURATIONS_MINUTES: [i64; 4] = [60, 90, 120, 180];

/// Sensor physics of the simulated room.
#[derive(Debug, Clone)]
pub struct RoomModel {
    rng: StdRng,
}

impl RoomModel {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Every person adds about 150 ppm CO2, 0.3 °C and 20 VOC points.
    pub fn sample(&mut self, occupants: u32) -> RawSample {
        let rng = &mut self.rng;
        let rh_percent = 45.0 + rng.random_range(-2.0..=2.0);

        let (co2_ppm, temp_c, voc_index, motion) = if occupants == 0 {
            (
                400.0 + rng.random_range(-10.0..=20.0),
                22.0 + rng.random_range(-0.5..=0.5),
                50.0 + rng.random_range(0.0..=10.0),
                false,
            )
        } else {
            let p = f64::from(occupants);
            (
                400.0 + 150.0 * p + rng.random_range(-50.0..=50.0),
                22.0 + 0.3 * p + rng.random_range(-0.2..=0.2),
                100.0 + 20.0 * p + rng.random_range(0.0..=30.0),
                rng.random_bool(0.9),
            )
        };

        RawSample {
            co2: Some(Co2Sample {
                co2_ppm,
                temp_c,
                rh_percent,
            }),
            env: Some(EnvSample {
                temp_c,
                rh_percent,
                gas_ohms: voc_index * 1000.0,
            }),
            motion,
        }
    }
}

/// Books the room at random while it is idle during office hours.
#[derive(Debug, Clone)]
pub struct MeetingPlanner {
    rng: StdRng,
    place_id: PlaceId,
    capacity: u32,
    chance: f64,
    current: Option<Reservation>,
}

impl MeetingPlanner {
    pub fn new(place_id: PlaceId, capacity: u32, chance: f64, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            place_id,
            capacity: capacity.max(1),
            chance: chance.clamp(0.0, 1.0),
            current: None,
        }
    }

    pub fn is_office_hour(at: &DateTime<Utc>) -> bool {
        (OFFICE_START_HOUR..OFFICE_END_HOUR).contains(&at.hour())
    }

    /// Advances to `at`; returns the reservation if a meeting starts now.
    pub fn step(&mut self, at: DateTime<Utc>) -> Option<Reservation> {
        if self.current.as_ref().is_some_and(|r| !r.contains(at)) {
            self.current = None;
        }
        if self.current.is_some() || !Self::is_office_hour(&at) {
            return None;
        }
        if !self.rng.random_bool(self.chance) {
            return None;
        }

        let minutes = DURATIONS_MINUTES[self.rng.random_range(0..DURATIONS_MINUTES.len())];
        let closing = at
            .date_naive()
            .and_hms_opt(OFFICE_END_HOUR, 0, 0)
            .map(|t| t.and_utc())
            .unwrap_or(at);
        let end_ts = (at + Duration::minutes(minutes)).min(closing);

        let reservation = Reservation {
            place_id: self.place_id.clone(),
            start_ts: at,
            end_ts,
            attendee_count: self.rng.random_range(1..=self.capacity),
        };
        self.current = Some(reservation.clone());
        Some(reservation)
    }

    pub fn occupants(&self, at: DateTime<Utc>) -> u32 {
        self.current
            .as_ref()
            .filter(|r| r.contains(at))
            .map_or(0, |r| r.attendee_count)
    }
}

/// `SensorSource` over the simulated room, for running without hardware.
///
/// The booking chance applies per read, so it should be scaled down for
/// short read intervals. Meetings it plans are handed out through
/// `take_booking` so the agent can store them next to the readings.
#[derive(Debug, Clone)]
pub struct SyntheticSource {
    planner: MeetingPlanner,
    room: RoomModel,
    booked: Option<Reservation>,
}

impl SyntheticSource {
    pub fn new(place_id: PlaceId, capacity: u32, chance_per_read: f64, seed: u64) -> Self {
        Self {
            planner: MeetingPlanner::new(place_id, capacity, chance_per_read, seed),
            room: RoomModel::new(seed.wrapping_add(1)),
            booked: None,
        }
    }
}

impl SensorSource for SyntheticSource {
    fn read(&mut self, at: DateTime<Utc>) -> Result<RawSample> {
        if let Some(reservation) = self.planner.step(at) {
            self.booked = Some(reservation);
        }
        Ok(self.room.sample(self.planner.occupants(at)))
    }

    fn take_booking(&mut self) -> Option<Reservation> {
        self.booked.take()
    }
}
