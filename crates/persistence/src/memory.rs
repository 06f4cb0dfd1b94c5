//! In-process `RecordStore` with injectable faults.

use crate::{RecordId, RecordStore, Result, StoreError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::types::{ForecastRecord, Place, PlaceId, Reservation, SensorReading};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Tables {
    places: Vec<Place>,
    readings: Vec<SensorReading>,
    reservations: Vec<Reservation>,
    forecasts: Vec<(RecordId, ForecastRecord)>,
    next_id: u64,
}

#[derive(Debug, Default, Clone)]
struct Faults {
    reject_auth: bool,
    fail_fetch: bool,
    fail_deletes: bool,
    fail_every_nth_create: Option<usize>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
    faults: Faults,
    creates: AtomicUsize,
    authenticated: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_place(self, place: Place) -> Self {
        self.lock().places.push(place);
        self
    }

    pub fn with_readings(self, readings: impl IntoIterator<Item = SensorReading>) -> Self {
        self.lock().readings.extend(readings);
        self
    }

    pub fn with_reservations(self, reservations: impl IntoIterator<Item = Reservation>) -> Self {
        self.lock().reservations.extend(reservations);
        self
    }

    pub fn with_forecasts(self, forecasts: impl IntoIterator<Item = ForecastRecord>) -> Self {
        {
            let mut tables = self.lock();
            for record in forecasts {
                let id = next_id(&mut tables);
                tables.forecasts.push((id, record));
            }
        }
        self
    }

    pub fn rejecting_auth(mut self) -> Self {
        self.faults.reject_auth = true;
        self
    }

    pub fn failing_fetches(mut self) -> Self {
        self.faults.fail_fetch = true;
        self
    }

    pub fn failing_deletes(mut self) -> Self {
        self.faults.fail_deletes = true;
        self
    }

    /// Every `n`-th create call (1-based) fails.
    pub fn failing_every_nth_create(mut self, n: usize) -> Self {
        self.faults.fail_every_nth_create = Some(n.max(1));
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    pub fn forecasts_for(&self, place: &PlaceId) -> Vec<ForecastRecord> {
        let mut found: Vec<ForecastRecord> = self
            .lock()
            .forecasts
            .iter()
            .filter(|(_, f)| &f.place_id == place)
            .map(|(_, f)| f.clone())
            .collect();
        found.sort_by_key(|f| f.target_ts);
        found
    }

    pub fn readings_for(&self, place: &PlaceId) -> Vec<SensorReading> {
        self.lock()
            .readings
            .iter()
            .filter(|r| &r.place_id == place)
            .cloned()
            .collect()
    }

    pub fn reservations_for(&self, place: &PlaceId) -> Vec<Reservation> {
        self.lock()
            .reservations
            .iter()
            .filter(|r| &r.place_id == place)
            .cloned()
            .collect()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_fetch(&self) -> Result<()> {
        if self.faults.fail_fetch {
            return Err(StoreError::Network("injected fetch failure".to_string()));
        }
        Ok(())
    }

    fn check_create(&self) -> Result<()> {
        let count = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        match self.faults.fail_every_nth_create {
            Some(n) if count % n == 0 => Err(StoreError::Status {
                status: 500,
                body: format!("injected failure on create #{}", count),
            }),
            _ => Ok(()),
        }
    }
}

fn next_id(tables: &mut Tables) -> RecordId {
    tables.next_id += 1;
    RecordId(format!("mem{:06}", tables.next_id))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn authenticate(&mut self) -> Result<()> {
        if self.faults.reject_auth {
            self.authenticated = false;
            return Err(StoreError::Authentication(
                "injected authentication failure".to_string(),
            ));
        }
        self.authenticated = true;
        Ok(())
    }

    async fn list_active_places(&self) -> Result<Vec<Place>> {
        self.check_fetch()?;
        Ok(self
            .lock()
            .places
            .iter()
            .filter(|p| p.is_active)
            .cloned()
            .collect())
    }

    async fn get_place(&self, id: &PlaceId) -> Result<Place> {
        self.check_fetch()?;
        self.lock()
            .places
            .iter()
            .find(|p| &p.id == id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("place {}", id)))
    }

    async fn list_readings_since(
        &self,
        place: &PlaceId,
        since: DateTime<Utc>,
    ) -> Result<Vec<SensorReading>> {
        self.check_fetch()?;
        let mut readings: Vec<SensorReading> = self
            .lock()
            .readings
            .iter()
            .filter(|r| &r.place_id == place && r.recorded_at >= since)
            .cloned()
            .collect();
        readings.sort_by_key(|r| r.recorded_at);
        Ok(readings)
    }

    async fn list_reservations(&self, place: &PlaceId) -> Result<Vec<Reservation>> {
        self.check_fetch()?;
        Ok(self
            .lock()
            .reservations
            .iter()
            .filter(|r| &r.place_id == place)
            .cloned()
            .collect())
    }

    async fn list_forecast_ids(&self, place: &PlaceId) -> Result<Vec<RecordId>> {
        self.check_fetch()?;
        Ok(self
            .lock()
            .forecasts
            .iter()
            .filter(|(_, f)| &f.place_id == place)
            .map(|(id, _)| id.clone())
            .collect())
    }

    async fn delete_forecast(&self, id: &RecordId) -> Result<()> {
        if self.faults.fail_deletes {
            return Err(StoreError::Network("injected delete failure".to_string()));
        }
        let mut tables = self.lock();
        let before = tables.forecasts.len();
        tables.forecasts.retain(|(fid, _)| fid != id);
        if tables.forecasts.len() == before {
            return Err(StoreError::NotFound(format!("forecast {}", id)));
        }
        Ok(())
    }

    async fn create_forecast(&self, record: &ForecastRecord) -> Result<()> {
        self.check_create()?;
        let mut tables = self.lock();
        let id = next_id(&mut tables);
        tables.forecasts.push((id, record.clone()));
        Ok(())
    }

    async fn create_reading(&self, reading: &SensorReading) -> Result<()> {
        self.check_create()?;
        self.lock().readings.push(reading.clone());
        Ok(())
    }

    async fn create_reservation(&self, reservation: &Reservation) -> Result<()> {
        self.check_create()?;
        self.lock().reservations.push(reservation.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests;
