use chrono::{DateTime, Utc};
use common::types::Reservation;

/// Attendee count of the first reservation covering `at`, or 0.
///
/// Intervals are half-open, so a booking ending at `at` does not count.
/// Callers pass the reservations of a single place.
pub fn occupant_count(at: DateTime<Utc>, reservations: &[Reservation]) -> u32 {
    reservations
        .iter()
        .find(|r| r.contains(at))
        .map_or(0, |r| r.attendee_count)
}
