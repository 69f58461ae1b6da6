//! Administrative corrections to a trip and the checks that keep them
//! consistent with the checkpoint grammar.

use chrono::{DateTime, Utc};

use super::state_machine::validate_sequence;
use super::{DriverRef, LogId, TripRecord, TripStatus};
use crate::error::GatewayError;

/// A rewrite of one log's timestamp and/or address.
///
/// The log's kind and identity are not editable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogUpdate {
    /// Log to rewrite.
    pub log_id: LogId,
    /// New timestamp.
    pub timestamp: Option<DateTime<Utc>>,
    /// New address. An empty string clears it.
    pub address: Option<String>,
}

/// A set of administrative changes applied to one trip as a unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripUpdate {
    /// Reassign the trip to this driver.
    pub driver: Option<DriverRef>,
    /// Override the status.
    pub status: Option<TripStatus>,
    /// Override the start date.
    pub start_date: Option<DateTime<Utc>>,
    /// Per-log rewrites.
    pub logs: Vec<LogUpdate>,
}

impl TripUpdate {
    /// Returns `true` if the update changes nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.driver.is_none()
            && self.status.is_none()
            && self.start_date.is_none()
            && self.logs.is_empty()
    }

    /// Applies the update to `record` and checks the result.
    ///
    /// The edited logs are re-sorted by (timestamp, id) and must still
    /// spell a valid prefix of the grammar starting at `Exit Factory`,
    /// so a timestamp change cannot silently reorder checkpoints.
    ///
    /// Whether the target driver already has another trip in progress is
    /// not visible from one record and is checked by the store.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::LogNotFound`] if a log id is not on the trip.
    /// - [`GatewayError::EditRejected`] if the result breaks checkpoint
    ///   order, starts after its first checkpoint, or reopens a trip that
    ///   already reached `Arrival at Factory`.
    pub fn apply(&self, record: &TripRecord) -> Result<TripRecord, GatewayError> {
        let mut trip = record.trip.clone();
        let mut logs = record.logs.clone();

        for change in &self.logs {
            let log = logs
                .iter_mut()
                .find(|log| log.id == change.log_id)
                .ok_or(GatewayError::LogNotFound(change.log_id))?;
            if let Some(timestamp) = change.timestamp {
                log.timestamp = timestamp;
            }
            if let Some(address) = &change.address {
                let address = address.trim();
                log.address = (!address.is_empty()).then(|| address.to_string());
            }
        }
        if let Some(driver) = &self.driver {
            trip.driver = driver.clone();
        }
        if let Some(start_date) = self.start_date {
            trip.start_date = start_date;
        }
        if let Some(status) = self.status {
            trip.status = status;
        }

        let edited = TripRecord::new(trip, logs);

        let next = validate_sequence(edited.kinds()).map_err(|violation| {
            GatewayError::EditRejected(format!(
                "new timestamps put checkpoints out of order: {violation}"
            ))
        })?;

        if let Some(first) = edited.logs.first() {
            if edited.trip.start_date > first.timestamp {
                return Err(GatewayError::EditRejected(format!(
                    "start date {} is after the first checkpoint at {}",
                    edited.trip.start_date.to_rfc3339(),
                    first.timestamp.to_rfc3339()
                )));
            }
        }

        if edited.trip.status == TripStatus::InProgress && next.is_complete() {
            return Err(GatewayError::EditRejected(
                "a trip that reached Arrival at Factory cannot be set back to in_progress"
                    .to_string(),
            ));
        }

        Ok(edited)
    }
}
