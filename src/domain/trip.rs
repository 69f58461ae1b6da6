//! Trips, their status, and the read-only driver/car references attached
//! to them.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::checkpoint::{CheckpointKind, CheckpointLog, sort_logs};
use super::{DriverId, TripId};

/// Lifecycle status of a trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    /// The trip has not yet recorded its terminal checkpoint.
    InProgress,
    /// The trip recorded its terminal checkpoint (or an admin closed it).
    Completed,
}

impl TripStatus {
    /// Persisted and wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
        }
    }
}

impl fmt::Display for TripStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TripStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(Self::InProgress),
            "completed" => Ok(Self::Completed),
            other => Err(format!("unknown trip status: {other}")),
        }
    }
}

/// Car details copied onto a trip when it starts.
///
/// Kept on the trip so the display stays correct after the driver is
/// assigned a different car.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct CarSnapshot {
    /// Licence plate.
    pub plate: String,
    /// Car model.
    pub model: String,
}

/// Driver reference attached to a trip for display and grouping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DriverRef {
    /// Driver identifier.
    pub id: DriverId,
    /// Driver username at the time of the last assignment.
    pub username: String,
}

/// A driver as exposed by the fleet directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DriverProfile {
    /// Driver identifier.
    pub id: DriverId,
    /// Login name.
    pub username: String,
    /// Currently assigned car, if any.
    #[serde(default)]
    pub car: Option<CarSnapshot>,
}

impl DriverProfile {
    /// Returns the reference stored on trips.
    #[must_use]
    pub fn to_driver_ref(&self) -> DriverRef {
        DriverRef {
            id: self.id,
            username: self.username.clone(),
        }
    }
}

/// Trip header row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trip {
    /// Trip identifier.
    pub id: TripId,
    /// Owning driver.
    pub driver: DriverRef,
    /// Car assigned to the driver when the trip started.
    pub car: Option<CarSnapshot>,
    /// When the trip was started.
    pub start_date: DateTime<Utc>,
    /// Lifecycle status.
    pub status: TripStatus,
}

/// A trip together with its full checkpoint history.
///
/// Logs are always held in workflow order (timestamp, then append order).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRecord {
    /// Trip header.
    pub trip: Trip,
    /// Ordered checkpoint history.
    pub logs: Vec<CheckpointLog>,
}

impl TripRecord {
    /// Builds a record, sorting the logs into workflow order.
    #[must_use]
    pub fn new(trip: Trip, mut logs: Vec<CheckpointLog>) -> Self {
        sort_logs(&mut logs);
        Self { trip, logs }
    }

    /// Trip identifier.
    #[must_use]
    pub const fn id(&self) -> TripId {
        self.trip.id
    }

    /// Checkpoint kinds in workflow order.
    pub fn kinds(&self) -> impl Iterator<Item = CheckpointKind> + '_ {
        self.logs.iter().map(|log| log.kind)
    }

    /// Most recent checkpoint, if any.
    #[must_use]
    pub fn last_log(&self) -> Option<&CheckpointLog> {
        self.logs.last()
    }

    /// Returns `true` while the trip is in progress.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.trip.status == TripStatus::InProgress
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::domain::LogId;

    #[test]
    fn status_round_trips_through_str() {
        for status in [TripStatus::InProgress, TripStatus::Completed] {
            assert_eq!(status.as_str().parse::<TripStatus>(), Ok(status));
        }
        assert!("paused".parse::<TripStatus>().is_err());
    }

    #[test]
    fn record_sorts_logs_on_construction() {
        let Some(t0) = Utc.with_ymd_and_hms(2026, 5, 2, 8, 0, 0).single() else {
            panic!("valid timestamp");
        };
        let trip = Trip {
            id: TripId::new(1),
            driver: DriverRef {
                id: DriverId::new(1),
                username: "driver1".to_string(),
            },
            car: None,
            start_date: t0,
            status: TripStatus::InProgress,
        };
        let logs = vec![
            CheckpointLog {
                id: LogId::new(2),
                trip_id: TripId::new(1),
                kind: CheckpointKind::ArrivalWarehouse,
                timestamp: t0 + chrono::TimeDelta::hours(1),
                coordinates: None,
                address: None,
            },
            CheckpointLog {
                id: LogId::new(1),
                trip_id: TripId::new(1),
                kind: CheckpointKind::ExitFactory,
                timestamp: t0,
                coordinates: None,
                address: None,
            },
        ];
        let record = TripRecord::new(trip, logs);
        let kinds: Vec<_> = record.kinds().collect();
        assert_eq!(
            kinds,
            vec![CheckpointKind::ExitFactory, CheckpointKind::ArrivalWarehouse]
        );
        assert!(record.is_active());
        assert_eq!(
            record.last_log().map(|l| l.kind),
            Some(CheckpointKind::ArrivalWarehouse)
        );
    }
}
