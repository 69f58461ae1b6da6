//! Admin DTOs: trip listing, detail, and edits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use super::common_dto::{CheckpointLogDto, NextActionDto};
use super::history_dto::TripSummaryDto;
use crate::domain::{DriverId, LogId, LogUpdate, TripStatus};
use crate::service::{TripDetail, TripEdit};

/// Query parameters for `GET /admin/trips`.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AdminTripListQuery {
    /// Only trips of this driver.
    pub driver_id: Option<DriverId>,
}

/// Response body for `GET /admin/trips`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AdminTripListResponse {
    /// Trips, newest first.
    pub data: Vec<TripSummaryDto>,
    /// Number of trips returned.
    pub total: usize,
}

/// Response body for `GET /admin/trips/{id}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripDetailResponse {
    /// Derived figures.
    pub summary: TripSummaryDto,
    /// Checkpoints in time order, with coordinates and map links.
    pub timeline: Vec<CheckpointLogDto>,
    /// Next action derived from the timeline.
    pub next: NextActionDto,
}

impl From<&TripDetail> for TripDetailResponse {
    fn from(detail: &TripDetail) -> Self {
        Self {
            summary: TripSummaryDto::from(&detail.summary),
            timeline: detail.timeline.iter().map(CheckpointLogDto::from).collect(),
            next: NextActionDto::from(detail.summary.next),
        }
    }
}

/// A per-log correction. Only the timestamp and address can change.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct LogEditDto {
    /// Log to edit.
    pub log_id: LogId,
    /// New timestamp.
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    /// New address. An empty string clears it.
    #[serde(default)]
    pub address: Option<String>,
}

/// Request body for `PATCH /admin/trips/{id}`.
///
/// Checkpoint kinds cannot be edited and logs cannot be added or removed;
/// bodies carrying any other field are rejected.
#[derive(Debug, Clone, Default, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct EditTripRequest {
    /// Reassign the trip to this driver.
    #[serde(default)]
    pub driver_id: Option<DriverId>,
    /// Override the status.
    #[serde(default)]
    pub status: Option<TripStatus>,
    /// Override the start date.
    #[serde(default)]
    pub start_date: Option<DateTime<Utc>>,
    /// Per-log corrections.
    #[serde(default)]
    pub logs: Vec<LogEditDto>,
}

impl From<EditTripRequest> for TripEdit {
    fn from(req: EditTripRequest) -> Self {
        Self {
            driver_id: req.driver_id,
            status: req.status,
            start_date: req.start_date,
            logs: req
                .logs
                .into_iter()
                .map(|log| LogUpdate {
                    log_id: log.log_id,
                    timestamp: log.timestamp,
                    address: log.address,
                })
                .collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn edit_body_with_a_kind_is_refused() {
        let body = r#"{"logs":[{"log_id":1,"kind":"Arrival at Factory"}]}"#;
        assert!(serde_json::from_str::<EditTripRequest>(body).is_err());
        let body = r#"{"trip_id":3,"status":"completed"}"#;
        assert!(serde_json::from_str::<EditTripRequest>(body).is_err());
    }

    #[test]
    fn edit_body_maps_to_a_trip_edit() {
        let body = r#"{"driver_id":4,"logs":[{"log_id":1,"address":""}]}"#;
        let Ok(req) = serde_json::from_str::<EditTripRequest>(body) else {
            panic!("valid edit body");
        };
        let edit = TripEdit::from(req);
        assert_eq!(edit.driver_id, Some(DriverId::new(4)));
        assert_eq!(edit.logs.len(), 1);
        assert_eq!(edit.logs.first().and_then(|l| l.address.as_deref()), Some(""));
    }
}
