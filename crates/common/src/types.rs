pub mod place;
pub mod records;

pub use self::place::{Place, PlaceId};
pub use self::records::{ForecastRecord, Reservation, SensorReading};
