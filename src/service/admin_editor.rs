//! Privileged trip correction: reassignment, status and start-date
//! overrides, per-log timestamp/address rewrites, and whole-trip deletion.
//!
//! Every edit is checked against the trip's invariants before it is
//! written (see [`TripUpdate::apply`]). Log kinds and identities are never
//! editable, and single logs cannot be inserted or removed.

use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Utc};
use tracing::info;

use super::history::{MonthlyHistory, TripHistoryAggregator, TripSummary};
use crate::domain::{
    CheckpointLog, DriverId, LogUpdate, MonthPeriod, TripId, TripRecord, TripStatus, TripUpdate,
};
use crate::error::GatewayError;
use crate::persistence::{FleetDirectory, TripAdminStore};

/// An edit as submitted by an administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripEdit {
    /// Reassign to this driver.
    pub driver_id: Option<DriverId>,
    /// Override the status.
    pub status: Option<TripStatus>,
    /// Override the start date.
    pub start_date: Option<DateTime<Utc>>,
    /// Per-log timestamp/address rewrites.
    pub logs: Vec<LogUpdate>,
}

/// A trip with its full timeline, for the admin detail view.
#[derive(Debug, Clone, PartialEq)]
pub struct TripDetail {
    /// Derived figures.
    pub summary: TripSummary,
    /// Checkpoints in time order.
    pub timeline: Vec<CheckpointLog>,
}

/// Administrative access to trips.
#[derive(Debug, Clone)]
pub struct AdminTripEditor {
    store: Arc<dyn TripAdminStore>,
    fleet: Arc<dyn FleetDirectory>,
    offset: FixedOffset,
}

impl AdminTripEditor {
    /// Creates an editor.
    #[must_use]
    pub fn new(
        store: Arc<dyn TripAdminStore>,
        fleet: Arc<dyn FleetDirectory>,
        offset: FixedOffset,
    ) -> Self {
        Self {
            store,
            fleet,
            offset,
        }
    }

    /// Checks an update against `record` without writing anything and
    /// returns the trip as it would be stored.
    ///
    /// # Errors
    ///
    /// See [`TripUpdate::apply`].
    pub fn validate_edit(
        record: &TripRecord,
        update: &TripUpdate,
    ) -> Result<TripRecord, GatewayError> {
        update.apply(record)
    }

    /// Applies an edit.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::InvalidRequest`] for an empty edit.
    /// - [`GatewayError::DriverNotFound`] for an unknown target driver.
    /// - [`GatewayError::TripNotFound`] / [`GatewayError::LogNotFound`].
    /// - [`GatewayError::EditRejected`] if the result would break
    ///   checkpoint order or status rules.
    /// - [`GatewayError::ActiveTripConflict`] if the target driver
    ///   already has another trip in progress.
    pub async fn edit_trip(
        &self,
        trip_id: TripId,
        edit: TripEdit,
    ) -> Result<TripRecord, GatewayError> {
        let driver = match edit.driver_id {
            Some(driver_id) => Some(
                self.fleet
                    .driver(driver_id)
                    .await?
                    .ok_or(GatewayError::DriverNotFound(driver_id))?
                    .to_driver_ref(),
            ),
            None => None,
        };
        let update = TripUpdate {
            driver,
            status: edit.status,
            start_date: edit.start_date,
            logs: edit.logs,
        };
        if update.is_empty() {
            return Err(GatewayError::InvalidRequest(
                "edit does not change anything".to_string(),
            ));
        }

        let current = self.store.trip(trip_id).await?;
        Self::validate_edit(&current, &update)?;
        let stored = self.store.update_trip(trip_id, &update).await?;

        info!(
            %trip_id,
            driver_id = %stored.trip.driver.id,
            status = %stored.trip.status,
            logs_changed = update.logs.len(),
            "trip edited"
        );
        Ok(stored)
    }

    /// Deletes a trip with all its logs.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TripNotFound`] for an unknown trip.
    pub async fn delete_trip(&self, trip_id: TripId) -> Result<(), GatewayError> {
        self.store.delete_trip(trip_id).await?;
        info!(%trip_id, "trip deleted");
        Ok(())
    }

    /// All trips, optionally for one driver, newest first.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on storage failure.
    pub async fn list_trips(
        &self,
        driver_id: Option<DriverId>,
    ) -> Result<Vec<TripSummary>, GatewayError> {
        let records = self.store.list_trips(driver_id).await?;
        Ok(records.iter().map(TripHistoryAggregator::summarize).collect())
    }

    /// One trip with its full timeline.
    ///
    /// # Errors
    ///
    /// [`GatewayError::TripNotFound`] for an unknown trip.
    pub async fn trip_detail(&self, trip_id: TripId) -> Result<TripDetail, GatewayError> {
        let record = self.store.trip(trip_id).await?;
        Ok(TripDetail {
            summary: TripHistoryAggregator::summarize(&record),
            timeline: record.logs,
        })
    }

    /// A driver's trips grouped by month, newest first. With `period`,
    /// only that month is returned. Trips in progress are included.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on storage failure.
    pub async fn monthly_report(
        &self,
        driver_id: DriverId,
        period: Option<MonthPeriod>,
    ) -> Result<Vec<MonthlyHistory>, GatewayError> {
        let mut records = self.store.list_trips(Some(driver_id)).await?;
        if let Some(period) = period {
            records.retain(|record| period.contains(record.trip.start_date, self.offset));
        }
        Ok(TripHistoryAggregator::group_by_month(&records, self.offset))
    }
}
