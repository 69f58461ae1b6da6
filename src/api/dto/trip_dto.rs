//! Driver-facing trip DTOs: session view, branch choice, checkpoint capture.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::common_dto::{CheckpointLogDto, NextActionDto, TripDto};
use crate::domain::{BranchChoice, CheckpointKind, Coordinates, TripId, TripRecord};
use crate::error::GatewayError;
use crate::location::{LocationError, Position, PositionRequest, ReportedPosition};
use crate::service::SessionView;

/// A trip with its checkpoints and the action its history requires next.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripViewResponse {
    /// Trip header.
    pub trip: TripDto,
    /// Checkpoints in time order.
    pub checkpoints: Vec<CheckpointLogDto>,
    /// Next action derived from the checkpoints.
    pub next: NextActionDto,
}

impl From<&SessionView> for TripViewResponse {
    fn from(view: &SessionView) -> Self {
        Self::from_parts(&view.record, NextActionDto::from(view.next))
    }
}

impl From<&TripRecord> for TripViewResponse {
    fn from(record: &TripRecord) -> Self {
        let next = crate::domain::state_machine::next_action(&record.logs);
        Self::from_parts(record, NextActionDto::from(next))
    }
}

impl TripViewResponse {
    fn from_parts(record: &TripRecord, next: NextActionDto) -> Self {
        Self {
            trip: TripDto::from(&record.trip),
            checkpoints: record.logs.iter().map(CheckpointLogDto::from).collect(),
            next,
        }
    }
}

/// Request body for `POST /trips/active/choice`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ChoiceRequest {
    /// `another_warehouse` or `return_to_factory`.
    pub choice: BranchChoice,
}

/// Response body for `POST /trips/active/choice`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChoiceResponse {
    /// Trip the choice applies to.
    pub trip_id: TripId,
    /// The single checkpoint now required.
    pub next: NextActionDto,
}

/// A fix reported by the device.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct PositionDto {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Horizontal accuracy in metres.
    #[serde(default)]
    pub accuracy_m: Option<f64>,
    /// When the device took the fix, on the device clock.
    #[serde(default)]
    pub captured_at: Option<DateTime<Utc>>,
    /// When the device sent the request, on the same device clock.
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

impl PositionDto {
    /// Places the fix on the server clock.
    ///
    /// With both device timestamps the fix is dated `received_at` minus the
    /// interval the device measured, so device clock offset cancels out.
    /// A lone `captured_at` is taken as is and must come from a synced
    /// clock. Without timestamps the fix is dated at receipt.
    #[must_use]
    pub fn captured_at_on_server(&self, received_at: DateTime<Utc>) -> DateTime<Utc> {
        match (self.captured_at, self.sent_at) {
            (Some(captured), Some(sent)) => {
                let elapsed = sent.signed_duration_since(captured).max(TimeDelta::zero());
                received_at - elapsed
            }
            (Some(captured), None) => captured,
            (None, _) => received_at,
        }
    }
}

/// A failed acquisition reported by the device.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LocationErrorDto {
    /// Geolocation error code: 1 permission denied, 2 unavailable,
    /// 3 timeout.
    pub code: u16,
}

/// Request body for `POST /trips/active/checkpoints`.
///
/// Exactly one of `position` and `location_error` must be present.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CheckpointRequest {
    /// Checkpoint being recorded.
    pub kind: CheckpointKind,
    /// The device's fix.
    #[serde(default)]
    pub position: Option<PositionDto>,
    /// The device's acquisition failure.
    #[serde(default)]
    pub location_error: Option<LocationErrorDto>,
}

impl CheckpointRequest {
    /// Converts the device's report into a position source.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidRequest`] unless exactly one of `position`
    /// and `location_error` is present.
    pub fn reported_position(
        &self,
        request: &PositionRequest,
    ) -> Result<ReportedPosition, GatewayError> {
        match (&self.position, &self.location_error) {
            (Some(position), None) => Ok(ReportedPosition::Fix(Position {
                coordinates: Coordinates::new(position.latitude, position.longitude),
                accuracy_m: position.accuracy_m,
                captured_at: position.captured_at_on_server(Utc::now()),
            })),
            (None, Some(error)) => Ok(ReportedPosition::Failed(
                LocationError::from_geolocation_code(error.code, request.timeout),
            )),
            _ => Err(GatewayError::InvalidRequest(
                "exactly one of position and location_error is required".to_string(),
            )),
        }
    }
}
