//! PostgreSQL implementation of the persistence layer.
//!
//! Appends and edits run in a transaction that locks the trip row
//! (`SELECT ... FOR UPDATE`), so two devices racing the same checkpoint
//! are serialized and the second one sees the first one's log. The
//! partial unique index `trips_one_active_per_driver` backs the
//! one-active-trip rule.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};

use super::models::{DriverTuple, LogRow, LogTuple, TripRow, TripTuple, driver_profile};
use super::{CheckpointStore, FleetDirectory, TripAdminStore, admit_checkpoint};
use crate::domain::{
    CheckpointLog, DriverId, DriverProfile, NewCheckpoint, Trip, TripId, TripRecord, TripStatus,
    TripUpdate,
};
use crate::error::GatewayError;

const SELECT_TRIP: &str = "SELECT id, driver_id, driver_username, car_plate, car_model, \
                           start_date, status FROM trips";

const SELECT_LOGS: &str = "SELECT id, trip_id, kind, recorded_at, latitude, longitude, address \
                           FROM trip_logs";

fn db_error(err: sqlx::Error) -> GatewayError {
    GatewayError::PersistenceError(err.to_string())
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

/// Groups log rows under their trips, preserving trip order.
fn assemble(trips: Vec<TripTuple>, logs: Vec<LogTuple>) -> Result<Vec<TripRecord>, GatewayError> {
    let mut by_trip: HashMap<i64, Vec<CheckpointLog>> = HashMap::new();
    for tuple in logs {
        let row = LogRow::from(tuple);
        by_trip
            .entry(row.trip_id)
            .or_default()
            .push(CheckpointLog::try_from(row)?);
    }
    trips
        .into_iter()
        .map(|tuple| {
            let row = TripRow::from(tuple);
            let logs = by_trip.remove(&row.id).unwrap_or_default();
            Ok(TripRecord::new(Trip::try_from(row)?, logs))
        })
        .collect()
}

/// PostgreSQL-backed trip store using `sqlx::PgPool`.
#[derive(Debug, Clone)]
pub struct PostgresTripStore {
    pool: PgPool,
}

impl PostgresTripStore {
    /// Creates a new store with the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Applies the bundled migrations.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError::PersistenceError`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), GatewayError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| GatewayError::PersistenceError(e.to_string()))
    }

    async fn records(&self, trips: Vec<TripTuple>) -> Result<Vec<TripRecord>, GatewayError> {
        if trips.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = trips.iter().map(|t| t.0).collect();
        let logs = sqlx::query_as::<_, LogTuple>(&format!(
            "{SELECT_LOGS} WHERE trip_id = ANY($1) ORDER BY recorded_at, id"
        ))
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        assemble(trips, logs)
    }

    /// Loads and locks one trip with its logs inside `tx`.
    async fn lock_trip(
        tx: &mut Transaction<'_, Postgres>,
        trip_id: TripId,
    ) -> Result<TripRecord, GatewayError> {
        let trip = sqlx::query_as::<_, TripTuple>(&format!("{SELECT_TRIP} WHERE id = $1 FOR UPDATE"))
            .bind(trip_id.get())
            .fetch_optional(&mut **tx)
            .await
            .map_err(db_error)?
            .ok_or(GatewayError::TripNotFound(trip_id))?;
        let logs = sqlx::query_as::<_, LogTuple>(&format!(
            "{SELECT_LOGS} WHERE trip_id = $1 ORDER BY recorded_at, id"
        ))
        .bind(trip_id.get())
        .fetch_all(&mut **tx)
        .await
        .map_err(db_error)?;
        assemble(vec![trip], logs)?
            .pop()
            .ok_or(GatewayError::TripNotFound(trip_id))
    }

    async fn active_trip_id(&self, driver_id: DriverId) -> Result<Option<TripId>, GatewayError> {
        let id = sqlx::query_scalar::<_, i64>(
            "SELECT id FROM trips WHERE driver_id = $1 AND status = 'in_progress'",
        )
        .bind(driver_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(id.map(TripId::new))
    }

    async fn conflict_for(&self, driver_id: DriverId, fallback: TripId) -> GatewayError {
        match self.active_trip_id(driver_id).await {
            Ok(Some(trip_id)) => GatewayError::ActiveTripConflict { trip_id },
            Ok(None) => GatewayError::ActiveTripConflict { trip_id: fallback },
            Err(err) => err,
        }
    }
}

#[async_trait]
impl CheckpointStore for PostgresTripStore {
    async fn create_trip(
        &self,
        driver: &DriverProfile,
        start_date: DateTime<Utc>,
    ) -> Result<Trip, GatewayError> {
        let inserted = sqlx::query_as::<_, TripTuple>(
            "INSERT INTO trips (driver_id, driver_username, car_plate, car_model, start_date, status) \
             VALUES ($1, $2, $3, $4, $5, 'in_progress') \
             RETURNING id, driver_id, driver_username, car_plate, car_model, start_date, status",
        )
        .bind(driver.id.get())
        .bind(&driver.username)
        .bind(driver.car.as_ref().map(|c| c.plate.as_str()))
        .bind(driver.car.as_ref().map(|c| c.model.as_str()))
        .bind(start_date)
        .fetch_one(&self.pool)
        .await;

        match inserted {
            Ok(tuple) => Trip::try_from(TripRow::from(tuple)),
            Err(err) if is_unique_violation(&err) => {
                Err(self.conflict_for(driver.id, TripId::new(0)).await)
            }
            Err(err) => Err(db_error(err)),
        }
    }

    async fn append_checkpoint(
        &self,
        trip_id: TripId,
        checkpoint: NewCheckpoint,
    ) -> Result<CheckpointLog, GatewayError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let record = Self::lock_trip(&mut tx, trip_id).await?;
        let completes = admit_checkpoint(&record, checkpoint.kind)?;

        let now = Utc::now();
        let timestamp = record
            .last_log()
            .map_or(now, |last| last.timestamp.max(now));

        let tuple = sqlx::query_as::<_, LogTuple>(
            "INSERT INTO trip_logs (trip_id, kind, recorded_at, latitude, longitude, address) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING id, trip_id, kind, recorded_at, latitude, longitude, address",
        )
        .bind(trip_id.get())
        .bind(checkpoint.kind.label())
        .bind(timestamp)
        .bind(checkpoint.coordinates.map(|c| c.latitude))
        .bind(checkpoint.coordinates.map(|c| c.longitude))
        .bind(checkpoint.address.as_deref())
        .fetch_one(&mut *tx)
        .await
        .map_err(db_error)?;

        if completes {
            sqlx::query("UPDATE trips SET status = 'completed' WHERE id = $1")
                .bind(trip_id.get())
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        CheckpointLog::try_from(LogRow::from(tuple))
    }

    async fn active_trip(&self, driver_id: DriverId) -> Result<Option<TripRecord>, GatewayError> {
        let trip = sqlx::query_as::<_, TripTuple>(&format!(
            "{SELECT_TRIP} WHERE driver_id = $1 AND status = 'in_progress'"
        ))
        .bind(driver_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        match trip {
            Some(tuple) => Ok(self.records(vec![tuple]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn trip(&self, trip_id: TripId) -> Result<TripRecord, GatewayError> {
        let tuple = sqlx::query_as::<_, TripTuple>(&format!("{SELECT_TRIP} WHERE id = $1"))
            .bind(trip_id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?
            .ok_or(GatewayError::TripNotFound(trip_id))?;
        self.records(vec![tuple])
            .await?
            .pop()
            .ok_or(GatewayError::TripNotFound(trip_id))
    }

    async fn trips_in_range(
        &self,
        driver_id: DriverId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TripRecord>, GatewayError> {
        let trips = sqlx::query_as::<_, TripTuple>(&format!(
            "{SELECT_TRIP} WHERE driver_id = $1 AND start_date >= $2 AND start_date < $3 \
             ORDER BY start_date DESC, id DESC"
        ))
        .bind(driver_id.get())
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;
        self.records(trips).await
    }
}

#[async_trait]
impl TripAdminStore for PostgresTripStore {
    async fn list_trips(
        &self,
        driver_id: Option<DriverId>,
    ) -> Result<Vec<TripRecord>, GatewayError> {
        let trips = if let Some(id) = driver_id {
            sqlx::query_as::<_, TripTuple>(&format!(
                "{SELECT_TRIP} WHERE driver_id = $1 ORDER BY start_date DESC, id DESC"
            ))
            .bind(id.get())
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, TripTuple>(&format!(
                "{SELECT_TRIP} ORDER BY start_date DESC, id DESC"
            ))
            .fetch_all(&self.pool)
            .await
        }
        .map_err(db_error)?;
        self.records(trips).await
    }

    async fn update_trip(
        &self,
        trip_id: TripId,
        update: &TripUpdate,
    ) -> Result<TripRecord, GatewayError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let current = Self::lock_trip(&mut tx, trip_id).await?;
        let edited = update.apply(&current)?;

        let written = sqlx::query(
            "UPDATE trips SET driver_id = $2, driver_username = $3, start_date = $4, status = $5 \
             WHERE id = $1",
        )
        .bind(trip_id.get())
        .bind(edited.trip.driver.id.get())
        .bind(&edited.trip.driver.username)
        .bind(edited.trip.start_date)
        .bind(edited.trip.status.as_str())
        .execute(&mut *tx)
        .await;
        if let Err(err) = written {
            if is_unique_violation(&err) && edited.trip.status == TripStatus::InProgress {
                drop(tx);
                return Err(self.conflict_for(edited.trip.driver.id, trip_id).await);
            }
            return Err(db_error(err));
        }

        for change in &update.logs {
            let Some(log) = edited.logs.iter().find(|log| log.id == change.log_id) else {
                return Err(GatewayError::LogNotFound(change.log_id));
            };
            sqlx::query("UPDATE trip_logs SET recorded_at = $2, address = $3 WHERE id = $1")
                .bind(log.id.get())
                .bind(log.timestamp)
                .bind(log.address.as_deref())
                .execute(&mut *tx)
                .await
                .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)?;
        Ok(edited)
    }

    async fn delete_trip(&self, trip_id: TripId) -> Result<(), GatewayError> {
        let result = sqlx::query("DELETE FROM trips WHERE id = $1")
            .bind(trip_id.get())
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        if result.rows_affected() == 0 {
            return Err(GatewayError::TripNotFound(trip_id));
        }
        Ok(())
    }
}

/// Read-only fleet lookups over the `users` and `cars` tables.
#[derive(Debug, Clone)]
pub struct PostgresFleetDirectory {
    pool: PgPool,
}

impl PostgresFleetDirectory {
    /// Creates a directory over the given connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl FleetDirectory for PostgresFleetDirectory {
    async fn driver(&self, driver_id: DriverId) -> Result<Option<DriverProfile>, GatewayError> {
        let row = sqlx::query_as::<_, DriverTuple>(
            "SELECT u.id, u.username, c.plate, c.model FROM users u \
             LEFT JOIN cars c ON c.id = u.car_id \
             WHERE u.id = $1 AND u.role = 'driver'",
        )
        .bind(driver_id.get())
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;
        Ok(row.map(driver_profile))
    }
}
