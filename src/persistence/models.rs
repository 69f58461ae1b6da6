//! Database row models for trips, checkpoint logs, and fleet lookups.

use chrono::{DateTime, Utc};

use crate::domain::{
    CarSnapshot, CheckpointKind, CheckpointLog, Coordinates, DriverId, DriverProfile, DriverRef,
    LogId, Trip, TripId, TripStatus,
};
use crate::error::GatewayError;

/// Column tuple selected for a trip row.
pub type TripTuple = (
    i64,
    i64,
    String,
    Option<String>,
    Option<String>,
    DateTime<Utc>,
    String,
);

/// Column tuple selected for a log row.
pub type LogTuple = (
    i64,
    i64,
    String,
    DateTime<Utc>,
    Option<f64>,
    Option<f64>,
    Option<String>,
);

/// Column tuple selected for a fleet directory row.
pub type DriverTuple = (i64, String, Option<String>, Option<String>);

/// A row from the `trips` table.
#[derive(Debug, Clone)]
pub struct TripRow {
    /// Auto-increment row ID.
    pub id: i64,
    /// Owning driver.
    pub driver_id: i64,
    /// Driver username at assignment time.
    pub driver_username: String,
    /// Car plate snapshot.
    pub car_plate: Option<String>,
    /// Car model snapshot.
    pub car_model: Option<String>,
    /// Trip start.
    pub start_date: DateTime<Utc>,
    /// `in_progress` or `completed`.
    pub status: String,
}

impl From<TripTuple> for TripRow {
    fn from(
        (id, driver_id, driver_username, car_plate, car_model, start_date, status): TripTuple,
    ) -> Self {
        Self {
            id,
            driver_id,
            driver_username,
            car_plate,
            car_model,
            start_date,
            status,
        }
    }
}

impl TryFrom<TripRow> for Trip {
    type Error = GatewayError;

    fn try_from(row: TripRow) -> Result<Self, Self::Error> {
        let status: TripStatus = row
            .status
            .parse()
            .map_err(|e: String| GatewayError::PersistenceError(format!("trip {}: {e}", row.id)))?;
        let car = match (row.car_plate, row.car_model) {
            (Some(plate), model) => Some(CarSnapshot {
                plate,
                model: model.unwrap_or_default(),
            }),
            (None, _) => None,
        };
        Ok(Self {
            id: TripId::new(row.id),
            driver: DriverRef {
                id: DriverId::new(row.driver_id),
                username: row.driver_username,
            },
            car,
            start_date: row.start_date,
            status,
        })
    }
}

/// A row from the `trip_logs` table.
#[derive(Debug, Clone)]
pub struct LogRow {
    /// Auto-increment row ID.
    pub id: i64,
    /// Owning trip.
    pub trip_id: i64,
    /// Checkpoint kind label.
    pub kind: String,
    /// Checkpoint time.
    pub recorded_at: DateTime<Utc>,
    /// Latitude, if captured.
    pub latitude: Option<f64>,
    /// Longitude, if captured.
    pub longitude: Option<f64>,
    /// Resolved address.
    pub address: Option<String>,
}

impl From<LogTuple> for LogRow {
    fn from((id, trip_id, kind, recorded_at, latitude, longitude, address): LogTuple) -> Self {
        Self {
            id,
            trip_id,
            kind,
            recorded_at,
            latitude,
            longitude,
            address,
        }
    }
}

impl TryFrom<LogRow> for CheckpointLog {
    type Error = GatewayError;

    fn try_from(row: LogRow) -> Result<Self, Self::Error> {
        let kind: CheckpointKind = row
            .kind
            .parse()
            .map_err(|e| GatewayError::PersistenceError(format!("log {}: {e}", row.id)))?;
        let coordinates = match (row.latitude, row.longitude) {
            (Some(lat), Some(lon)) => Some(Coordinates::new(lat, lon)),
            _ => None,
        };
        Ok(Self {
            id: LogId::new(row.id),
            trip_id: TripId::new(row.trip_id),
            kind,
            timestamp: row.recorded_at,
            coordinates,
            address: row.address,
        })
    }
}

/// Converts a fleet directory row into a profile.
#[must_use]
pub fn driver_profile((id, username, plate, model): DriverTuple) -> DriverProfile {
    DriverProfile {
        id: DriverId::new(id),
        username,
        car: plate.map(|plate| CarSnapshot {
            plate,
            model: model.unwrap_or_default(),
        }),
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn trip_row_converts() {
        let now = Utc::now();
        let row = TripRow::from((
            5,
            2,
            "driver2".to_string(),
            Some("ABC 123".to_string()),
            None,
            now,
            "completed".to_string(),
        ));
        let Ok(trip) = Trip::try_from(row) else {
            panic!("row should convert");
        };
        assert_eq!(trip.id, TripId::new(5));
        assert_eq!(trip.status, TripStatus::Completed);
        assert_eq!(trip.car.map(|c| c.plate), Some("ABC 123".to_string()));
    }

    #[test]
    fn unknown_status_is_a_persistence_error() {
        let row = TripRow::from((1, 1, "d".to_string(), None, None, Utc::now(), "paused".to_string()));
        assert!(matches!(
            Trip::try_from(row),
            Err(GatewayError::PersistenceError(_))
        ));
    }

    #[test]
    fn log_row_converts_kind_label_and_partial_coordinates() {
        let row = LogRow::from((
            9,
            5,
            "Arrival at Warehouse".to_string(),
            Utc::now(),
            Some(24.7),
            None,
            Some("Warehouse 3".to_string()),
        ));
        let Ok(log) = CheckpointLog::try_from(row) else {
            panic!("row should convert");
        };
        assert_eq!(log.kind, CheckpointKind::ArrivalWarehouse);
        assert!(log.coordinates.is_none());
    }

    #[test]
    fn driver_row_without_car() {
        let profile = driver_profile((3, "driver3".to_string(), None, None));
        assert_eq!(profile.id, DriverId::new(3));
        assert!(profile.car.is_none());
    }
}
