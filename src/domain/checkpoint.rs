//! Checkpoint kinds and recorded checkpoint log entries.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{LogId, TripId};

/// One of the four workflow events a driver records during a trip.
///
/// The serialized form is the human-readable label, which is also the
/// value stored in the `trip_logs.kind` column.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum CheckpointKind {
    /// The vehicle left the factory.
    #[serde(rename = "Exit Factory", alias = "exit_factory")]
    ExitFactory,
    /// The vehicle arrived at a warehouse.
    #[serde(rename = "Arrival at Warehouse", alias = "arrival_warehouse")]
    ArrivalWarehouse,
    /// The vehicle left a warehouse.
    #[serde(rename = "Exit Warehouse", alias = "exit_warehouse")]
    ExitWarehouse,
    /// The vehicle returned to the factory. Terminal checkpoint of a trip.
    #[serde(rename = "Arrival at Factory", alias = "arrival_factory")]
    ArrivalFactory,
}

impl CheckpointKind {
    /// Every checkpoint kind in workflow order.
    pub const ALL: [Self; 4] = [
        Self::ExitFactory,
        Self::ArrivalWarehouse,
        Self::ExitWarehouse,
        Self::ArrivalFactory,
    ];

    /// Display label, also used as the persisted and wire name.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::ExitFactory => "Exit Factory",
            Self::ArrivalWarehouse => "Arrival at Warehouse",
            Self::ExitWarehouse => "Exit Warehouse",
            Self::ArrivalFactory => "Arrival at Factory",
        }
    }

    /// Label of the operator action that records this checkpoint.
    #[must_use]
    pub const fn action_label(self) -> &'static str {
        match self {
            Self::ExitFactory => "Log Exit Factory",
            Self::ArrivalWarehouse => "Log Arrive Warehouse",
            Self::ExitWarehouse => "Log Exit Warehouse",
            Self::ArrivalFactory => "Log Arrive Factory (End Trip)",
        }
    }

    /// Returns `true` for the checkpoint that closes a trip.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::ArrivalFactory)
    }
}

impl fmt::Display for CheckpointKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned when a string is not a known checkpoint kind.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown checkpoint kind: {0}")]
pub struct UnknownCheckpointKind(pub String);

impl FromStr for CheckpointKind {
    type Err = UnknownCheckpointKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Exit Factory" | "exit_factory" => Ok(Self::ExitFactory),
            "Arrival at Warehouse" | "arrival_warehouse" => Ok(Self::ArrivalWarehouse),
            "Exit Warehouse" | "exit_warehouse" => Ok(Self::ExitWarehouse),
            "Arrival at Factory" | "arrival_factory" => Ok(Self::ArrivalFactory),
            other => Err(UnknownCheckpointKind(other.to_string())),
        }
    }
}

/// A WGS-84 latitude/longitude pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
}

impl Coordinates {
    /// Creates a coordinate pair without validation.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Returns `true` if both components are finite and within range.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite()
            && self.longitude.is_finite()
            && (-90.0..=90.0).contains(&self.latitude)
            && (-180.0..=180.0).contains(&self.longitude)
    }

    /// Map link for the admin timeline view.
    #[must_use]
    pub fn maps_url(&self) -> String {
        format!(
            "https://www.google.com/maps?q={},{}",
            self.latitude, self.longitude
        )
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6}, {:.6}", self.latitude, self.longitude)
    }
}

/// A checkpoint as handed to the log-append interface.
///
/// The timestamp and identifier are assigned by the store on append.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCheckpoint {
    /// Checkpoint kind being recorded.
    pub kind: CheckpointKind,
    /// Device position at the time of the checkpoint, if captured.
    pub coordinates: Option<Coordinates>,
    /// Resolved address, or the coordinate fallback string.
    pub address: Option<String>,
}

/// A persisted checkpoint log entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointLog {
    /// Log identifier (append order).
    pub id: LogId,
    /// Owning trip.
    pub trip_id: TripId,
    /// Checkpoint kind. Immutable once written.
    pub kind: CheckpointKind,
    /// When the checkpoint was recorded.
    pub timestamp: DateTime<Utc>,
    /// Device position, if one was captured.
    pub coordinates: Option<Coordinates>,
    /// Human-readable address.
    pub address: Option<String>,
}

/// Sorts logs into workflow order: by timestamp, then by append order.
pub fn sort_logs(logs: &mut [CheckpointLog]) {
    logs.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn log(id: i64, kind: CheckpointKind, ts: DateTime<Utc>) -> CheckpointLog {
        CheckpointLog {
            id: LogId::new(id),
            trip_id: TripId::new(1),
            kind,
            timestamp: ts,
            coordinates: None,
            address: None,
        }
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for kind in CheckpointKind::ALL {
            assert_eq!(kind.label().parse::<CheckpointKind>(), Ok(kind));
        }
        assert!("Lunch Break".parse::<CheckpointKind>().is_err());
    }

    #[test]
    fn serde_uses_labels_and_accepts_snake_case() {
        let Ok(json) = serde_json::to_string(&CheckpointKind::ArrivalWarehouse) else {
            panic!("serialization failed");
        };
        assert_eq!(json, "\"Arrival at Warehouse\"");

        let Ok(kind) = serde_json::from_str::<CheckpointKind>("\"exit_warehouse\"") else {
            panic!("alias not accepted");
        };
        assert_eq!(kind, CheckpointKind::ExitWarehouse);
    }

    #[test]
    fn only_arrival_factory_is_terminal() {
        let terminal: Vec<_> = CheckpointKind::ALL
            .into_iter()
            .filter(|k| k.is_terminal())
            .collect();
        assert_eq!(terminal, vec![CheckpointKind::ArrivalFactory]);
    }

    #[test]
    fn coordinates_validation() {
        assert!(Coordinates::new(24.7136, 46.6753).is_valid());
        assert!(!Coordinates::new(91.0, 0.0).is_valid());
        assert!(!Coordinates::new(0.0, -180.5).is_valid());
        assert!(!Coordinates::new(f64::NAN, 0.0).is_valid());
    }

    #[test]
    fn sort_breaks_timestamp_ties_by_id() {
        let ts = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).single();
        let Some(ts) = ts else {
            panic!("valid timestamp");
        };
        let later = ts + chrono::TimeDelta::minutes(5);
        let mut logs = vec![
            log(3, CheckpointKind::ExitWarehouse, later),
            log(2, CheckpointKind::ArrivalWarehouse, ts),
            log(1, CheckpointKind::ExitFactory, ts),
        ];
        sort_logs(&mut logs);
        let ids: Vec<i64> = logs.iter().map(|l| l.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }
}
