//! Persistence layer: trip and checkpoint storage plus the read-only
//! fleet directory.
//!
//! The service layer only sees the traits defined here:
//!
//! - [`CheckpointStore`]: the log-append interface used by live sessions
//!   and history queries.
//! - [`TripAdminStore`]: administrative rewrite and deletion.
//! - [`FleetDirectory`]: driver and car lookups owned by fleet
//!   management.
//!
//! Two backends implement them: [`memory`] (process-local, used when
//! persistence is disabled and in tests) and [`postgres`] (`sqlx::PgPool`).
//! Both enforce the same invariants: at most one in-progress trip per
//! driver, and appends that follow the checkpoint grammar.

pub mod memory;
pub mod models;
pub mod postgres;

use std::fmt;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::state_machine::next_action;
use crate::domain::{
    CheckpointKind, CheckpointLog, DriverId, DriverProfile, NewCheckpoint, NextAction, Trip,
    TripId, TripRecord, TripStatus, TripUpdate,
};
use crate::error::GatewayError;

pub use memory::{InMemoryFleetDirectory, InMemoryTripStore};
pub use postgres::{PostgresFleetDirectory, PostgresTripStore};

/// Durable storage for trips and their checkpoint logs.
///
/// Every method must be read-after-write consistent: once a write returns
/// `Ok`, subsequent reads observe it.
#[async_trait]
pub trait CheckpointStore: Send + Sync + fmt::Debug {
    /// Creates an in-progress trip with no logs for `driver`, snapshotting
    /// the driver's assigned car.
    ///
    /// # Errors
    ///
    /// [`GatewayError::ActiveTripConflict`] if the driver already has a
    /// trip in progress.
    async fn create_trip(
        &self,
        driver: &DriverProfile,
        start_date: DateTime<Utc>,
    ) -> Result<Trip, GatewayError>;

    /// Appends a checkpoint, stamped with the current time.
    ///
    /// Recording `Arrival at Factory` marks the trip completed in the same
    /// write.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::TripNotFound`] for an unknown trip.
    /// - [`GatewayError::TripCompleted`] if the trip is closed.
    /// - [`GatewayError::OutOfSequence`] if the kind is not admissible
    ///   after the stored history.
    /// - [`GatewayError::GrammarViolation`] if the stored history is
    ///   already corrupt.
    /// - [`GatewayError::PersistenceError`] on storage failure.
    async fn append_checkpoint(
        &self,
        trip_id: TripId,
        checkpoint: NewCheckpoint,
    ) -> Result<CheckpointLog, GatewayError>;

    /// The driver's in-progress trip with its full log list, if any.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on storage failure.
    async fn active_trip(&self, driver_id: DriverId) -> Result<Option<TripRecord>, GatewayError>;

    /// A trip with its full log list.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TripNotFound`] for an unknown trip.
    async fn trip(&self, trip_id: TripId) -> Result<TripRecord, GatewayError>;

    /// The driver's trips (any status) whose start date falls in
    /// `[from, to)`, newest first.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on storage failure.
    async fn trips_in_range(
        &self,
        driver_id: DriverId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TripRecord>, GatewayError>;
}

/// Administrative access to stored trips.
#[async_trait]
pub trait TripAdminStore: CheckpointStore {
    /// All trips, optionally for one driver, newest first.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on storage failure.
    async fn list_trips(&self, driver_id: Option<DriverId>)
    -> Result<Vec<TripRecord>, GatewayError>;

    /// Applies `update` atomically and returns the stored result.
    ///
    /// The update is re-validated against the current row under the
    /// store's lock (see [`TripUpdate::apply`]).
    ///
    /// # Errors
    ///
    /// - [`GatewayError::TripNotFound`] / [`GatewayError::LogNotFound`].
    /// - [`GatewayError::EditRejected`] if the result breaks the trip's
    ///   invariants.
    /// - [`GatewayError::ActiveTripConflict`] if the result would give a
    ///   driver a second trip in progress.
    async fn update_trip(
        &self,
        trip_id: TripId,
        update: &TripUpdate,
    ) -> Result<TripRecord, GatewayError>;

    /// Deletes a trip and all its logs.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TripNotFound`] for an unknown trip.
    async fn delete_trip(&self, trip_id: TripId) -> Result<(), GatewayError>;
}

/// Read-only driver lookup owned by fleet management.
#[async_trait]
pub trait FleetDirectory: Send + Sync + fmt::Debug {
    /// The driver with its currently assigned car, if known.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on storage failure.
    async fn driver(&self, driver_id: DriverId) -> Result<Option<DriverProfile>, GatewayError>;
}

/// Checks whether `kind` may be appended to `record`.
///
/// Returns `true` when the append completes the trip.
pub(crate) fn admit_checkpoint(
    record: &TripRecord,
    kind: CheckpointKind,
) -> Result<bool, GatewayError> {
    if record.trip.status == TripStatus::Completed {
        return Err(GatewayError::TripCompleted(record.id()));
    }
    match next_action(&record.logs) {
        NextAction::Invalid(violation) => Err(GatewayError::GrammarViolation {
            trip_id: record.id(),
            violation,
        }),
        next if next.admits(kind) => Ok(kind.is_terminal()),
        expected => Err(GatewayError::OutOfSequence {
            expected,
            got: kind,
        }),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{DriverRef, LogId};
    use crate::domain::CheckpointKind::{
        ArrivalFactory, ArrivalWarehouse, ExitFactory, ExitWarehouse,
    };

    fn record(kinds: &[CheckpointKind], status: TripStatus) -> TripRecord {
        let now = Utc::now();
        let trip = Trip {
            id: TripId::new(1),
            driver: DriverRef {
                id: DriverId::new(1),
                username: "driver1".to_string(),
            },
            car: None,
            start_date: now,
            status,
        };
        let logs = kinds
            .iter()
            .zip(1_i64..)
            .map(|(kind, i)| CheckpointLog {
                id: LogId::new(i),
                trip_id: TripId::new(1),
                kind: *kind,
                timestamp: now,
                coordinates: None,
                address: None,
            })
            .collect();
        TripRecord::new(trip, logs)
    }

    #[test]
    fn first_append_must_be_exit_factory() {
        let empty = record(&[], TripStatus::InProgress);
        assert!(matches!(admit_checkpoint(&empty, ExitFactory), Ok(false)));
        assert!(matches!(
            admit_checkpoint(&empty, ArrivalWarehouse),
            Err(GatewayError::OutOfSequence { got: ArrivalWarehouse, .. })
        ));
    }

    #[test]
    fn duplicate_kind_is_rejected() {
        let started = record(&[ExitFactory], TripStatus::InProgress);
        assert!(matches!(
            admit_checkpoint(&started, ExitFactory),
            Err(GatewayError::OutOfSequence {
                expected: NextAction::Require(ArrivalWarehouse),
                got: ExitFactory,
            })
        ));
    }

    #[test]
    fn arrival_factory_completes() {
        let at_branch = record(
            &[ExitFactory, ArrivalWarehouse, ExitWarehouse],
            TripStatus::InProgress,
        );
        assert!(matches!(admit_checkpoint(&at_branch, ArrivalFactory), Ok(true)));
        assert!(matches!(admit_checkpoint(&at_branch, ArrivalWarehouse), Ok(false)));
    }

    #[test]
    fn completed_trip_rejects_appends() {
        let done = record(
            &[ExitFactory, ArrivalWarehouse, ExitWarehouse, ArrivalFactory],
            TripStatus::Completed,
        );
        assert!(matches!(
            admit_checkpoint(&done, ExitFactory),
            Err(GatewayError::TripCompleted(_))
        ));
    }

    #[test]
    fn corrupt_history_is_reported_not_extended() {
        let corrupt = record(&[ExitFactory, ExitFactory], TripStatus::InProgress);
        assert!(matches!(
            admit_checkpoint(&corrupt, ArrivalWarehouse),
            Err(GatewayError::GrammarViolation { .. })
        ));
    }
}
