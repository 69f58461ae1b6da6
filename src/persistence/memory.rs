//! Process-local storage backends.
//!
//! Used when `PERSISTENCE_ENABLED=false` and as test doubles. They keep
//! the same invariants as the PostgreSQL backend, so service-level tests
//! against them exercise the real rules.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use super::{CheckpointStore, FleetDirectory, TripAdminStore, admit_checkpoint};
use crate::domain::{
    CheckpointLog, DriverId, DriverProfile, LogId, NewCheckpoint, Trip, TripId, TripRecord,
    TripStatus, TripUpdate,
};
use crate::error::GatewayError;

#[derive(Debug, Default)]
struct TripTable {
    trips: BTreeMap<TripId, TripRecord>,
    last_trip_id: i64,
    last_log_id: i64,
}

impl TripTable {
    fn active_for(&self, driver_id: DriverId) -> Option<&TripRecord> {
        self.trips
            .values()
            .find(|record| record.trip.driver.id == driver_id && record.is_active())
    }

    fn newest_first(&self, filter: impl Fn(&TripRecord) -> bool) -> Vec<TripRecord> {
        let mut records: Vec<TripRecord> = self
            .trips
            .values()
            .filter(|record| filter(record))
            .cloned()
            .collect();
        records.sort_by(|a, b| {
            b.trip
                .start_date
                .cmp(&a.trip.start_date)
                .then(b.id().cmp(&a.id()))
        });
        records
    }
}

/// In-memory trip store.
///
/// One [`RwLock`] guards the whole table: the one-active-trip-per-driver
/// rule spans trips, so writes are serialized across all of them.
#[derive(Debug, Default)]
pub struct InMemoryTripStore {
    table: RwLock<TripTable>,
}

impl InMemoryTripStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored trips.
    pub async fn len(&self) -> usize {
        self.table.read().await.trips.len()
    }

    /// Returns `true` if no trips are stored.
    pub async fn is_empty(&self) -> bool {
        self.table.read().await.trips.is_empty()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryTripStore {
    async fn create_trip(
        &self,
        driver: &DriverProfile,
        start_date: DateTime<Utc>,
    ) -> Result<Trip, GatewayError> {
        let mut table = self.table.write().await;
        if let Some(active) = table.active_for(driver.id) {
            return Err(GatewayError::ActiveTripConflict {
                trip_id: active.id(),
            });
        }
        table.last_trip_id += 1;
        let trip = Trip {
            id: TripId::new(table.last_trip_id),
            driver: driver.to_driver_ref(),
            car: driver.car.clone(),
            start_date,
            status: TripStatus::InProgress,
        };
        table
            .trips
            .insert(trip.id, TripRecord::new(trip.clone(), Vec::new()));
        Ok(trip)
    }

    async fn append_checkpoint(
        &self,
        trip_id: TripId,
        checkpoint: NewCheckpoint,
    ) -> Result<CheckpointLog, GatewayError> {
        let mut table = self.table.write().await;
        let next_log_id = table.last_log_id + 1;

        let record = table
            .trips
            .get_mut(&trip_id)
            .ok_or(GatewayError::TripNotFound(trip_id))?;
        let completes = admit_checkpoint(record, checkpoint.kind)?;
        let log_id = LogId::new(next_log_id);

        // Never stamp before the current tail, or the new log would sort
        // ahead of its predecessor.
        let now = Utc::now();
        let timestamp = record
            .last_log()
            .map_or(now, |last| last.timestamp.max(now));

        let log = CheckpointLog {
            id: log_id,
            trip_id,
            kind: checkpoint.kind,
            timestamp,
            coordinates: checkpoint.coordinates,
            address: checkpoint.address,
        };
        record.logs.push(log.clone());
        if completes {
            record.trip.status = TripStatus::Completed;
        }
        table.last_log_id = next_log_id;
        Ok(log)
    }

    async fn active_trip(&self, driver_id: DriverId) -> Result<Option<TripRecord>, GatewayError> {
        Ok(self.table.read().await.active_for(driver_id).cloned())
    }

    async fn trip(&self, trip_id: TripId) -> Result<TripRecord, GatewayError> {
        self.table
            .read()
            .await
            .trips
            .get(&trip_id)
            .cloned()
            .ok_or(GatewayError::TripNotFound(trip_id))
    }

    async fn trips_in_range(
        &self,
        driver_id: DriverId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TripRecord>, GatewayError> {
        let table = self.table.read().await;
        Ok(table.newest_first(move |record| {
            record.trip.driver.id == driver_id
                && record.trip.start_date >= from
                && record.trip.start_date < to
        }))
    }
}

#[async_trait]
impl TripAdminStore for InMemoryTripStore {
    async fn list_trips(
        &self,
        driver_id: Option<DriverId>,
    ) -> Result<Vec<TripRecord>, GatewayError> {
        let table = self.table.read().await;
        Ok(table.newest_first(move |record| {
            driver_id.is_none_or(|id| record.trip.driver.id == id)
        }))
    }

    async fn update_trip(
        &self,
        trip_id: TripId,
        update: &TripUpdate,
    ) -> Result<TripRecord, GatewayError> {
        let mut table = self.table.write().await;
        let current = table
            .trips
            .get(&trip_id)
            .ok_or(GatewayError::TripNotFound(trip_id))?;
        let edited = update.apply(current)?;

        if edited.is_active() {
            if let Some(other) = table
                .active_for(edited.trip.driver.id)
                .filter(|other| other.id() != trip_id)
            {
                return Err(GatewayError::ActiveTripConflict {
                    trip_id: other.id(),
                });
            }
        }

        table.trips.insert(trip_id, edited.clone());
        Ok(edited)
    }

    async fn delete_trip(&self, trip_id: TripId) -> Result<(), GatewayError> {
        self.table
            .write()
            .await
            .trips
            .remove(&trip_id)
            .map(|_| ())
            .ok_or(GatewayError::TripNotFound(trip_id))
    }
}

/// In-memory fleet directory.
#[derive(Debug, Default, Clone)]
pub struct InMemoryFleetDirectory {
    drivers: HashMap<DriverId, DriverProfile>,
}

impl InMemoryFleetDirectory {
    /// Creates a directory containing `drivers`.
    #[must_use]
    pub fn new(drivers: impl IntoIterator<Item = DriverProfile>) -> Self {
        Self {
            drivers: drivers.into_iter().map(|d| (d.id, d)).collect(),
        }
    }

    /// Loads drivers from a JSON array of
    /// `{"id", "username", "car": {"plate", "model"}}` objects.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] if the file cannot be read or
    /// parsed.
    pub fn from_json_file(path: &Path) -> Result<Self, GatewayError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            GatewayError::Internal(format!("cannot read fleet directory {}: {e}", path.display()))
        })?;
        Self::from_json(&raw)
    }

    /// Parses drivers from a JSON array.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Internal`] on malformed input.
    pub fn from_json(raw: &str) -> Result<Self, GatewayError> {
        let drivers: Vec<DriverProfile> = serde_json::from_str(raw)
            .map_err(|e| GatewayError::Internal(format!("invalid fleet directory: {e}")))?;
        Ok(Self::new(drivers))
    }

    /// Number of known drivers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.drivers.len()
    }

    /// Returns `true` if no drivers are known.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.drivers.is_empty()
    }
}

#[async_trait]
impl FleetDirectory for InMemoryFleetDirectory {
    async fn driver(&self, driver_id: DriverId) -> Result<Option<DriverProfile>, GatewayError> {
        Ok(self.drivers.get(&driver_id).cloned())
    }
}
