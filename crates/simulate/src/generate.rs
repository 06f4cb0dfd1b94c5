use crate::dataset::Dataset;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use common::types::{Place, PlaceId, SensorReading};
use forecast::comfort;
use sensing::synthetic::MeetingPlanner;
use sensing::{RawSample, RoomModel};

pub const READING_INTERVAL_MINUTES: i64 = 10;

#[derive(Debug, Clone)]
pub struct GenerateParams {
    pub days: u32,
    /// Generation stops at midnight starting this day.
    pub until: NaiveDate,
    pub places: Vec<PlaceId>,
    pub capacity: u32,
    pub booking_chance: f64,
    pub seed: u64,
}

/// Office-hour history of every place: one reading per slot and the
/// meetings that drove it.
pub fn generate(params: &GenerateParams) -> Dataset {
    let mut dataset = Dataset::default();
    let start = (params.until - Duration::days(i64::from(params.days)))
        .and_hms_opt(0, 0, 0)
        .map(|t| t.and_utc());
    let end = params.until.and_hms_opt(0, 0, 0).map(|t| t.and_utc());
    let (Some(start), Some(end)) = (start, end) else {
        return dataset;
    };

    for (index, place_id) in params.places.iter().enumerate() {
        let seed = params.seed.wrapping_add(2 * index as u64);
        let mut planner = MeetingPlanner::new(
            place_id.clone(),
            params.capacity,
            params.booking_chance,
            seed,
        );
        let mut room = RoomModel::new(seed.wrapping_add(1));

        dataset.places.push(Place {
            id: place_id.clone(),
            name: place_id.to_string(),
            capacity: Some(params.capacity),
            is_active: true,
        });

        let mut at = start;
        while at < end {
            if MeetingPlanner::is_office_hour(&at) {
                if let Some(reservation) = planner.step(at) {
                    dataset.reservations.push(reservation);
                }
                let sample = room.sample(planner.occupants(at));
                dataset.readings.push(reading(place_id, at, &sample));
            }
            at += Duration::minutes(READING_INTERVAL_MINUTES);
        }
    }

    dataset
}

fn reading(place_id: &PlaceId, at: DateTime<Utc>, sample: &RawSample) -> SensorReading {
    let temp_c = sample.co2.map(|c| comfort::round2(c.temp_c));
    let rh_percent = sample.co2.map(|c| comfort::round2(c.rh_percent));
    let co2_ppm = sample.co2.map(|c| c.co2_ppm.trunc());
    let voc_index = sample.env.map(|e| (e.gas_ohms / 1000.0).trunc());

    SensorReading {
        place_id: place_id.clone(),
        recorded_at: at,
        temp_c,
        rh_percent,
        co2_ppm,
        voc_index,
        pir_occupied: sample.motion,
        comfort_score: Some(comfort::score(temp_c, rh_percent, co2_ppm, voc_index)),
    }
}
