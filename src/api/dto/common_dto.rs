//! Shared DTO types used across multiple endpoints.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::domain::{
    BranchChoice, CarSnapshot, CheckpointKind, CheckpointLog, Coordinates, DriverRef, LogId,
    NextAction, Trip, TripId, TripStatus,
};

/// Trip header as returned by every trip endpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripDto {
    /// Trip identifier.
    pub id: TripId,
    /// Owning driver.
    pub driver: DriverRef,
    /// Car assigned when the trip started.
    pub car: Option<CarSnapshot>,
    /// When the trip was started.
    pub start_date: DateTime<Utc>,
    /// `in_progress` or `completed`.
    pub status: TripStatus,
}

impl From<&Trip> for TripDto {
    fn from(trip: &Trip) -> Self {
        Self {
            id: trip.id,
            driver: trip.driver.clone(),
            car: trip.car.clone(),
            start_date: trip.start_date,
            status: trip.status,
        }
    }
}

/// One recorded checkpoint.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckpointLogDto {
    /// Log identifier.
    pub id: LogId,
    /// Checkpoint kind (display label).
    pub kind: CheckpointKind,
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
    /// Device position, if captured.
    pub coordinates: Option<Coordinates>,
    /// Resolved address or coordinate fallback.
    pub address: Option<String>,
    /// Map link for the position.
    pub maps_url: Option<String>,
}

impl From<&CheckpointLog> for CheckpointLogDto {
    fn from(log: &CheckpointLog) -> Self {
        Self {
            id: log.id,
            kind: log.kind,
            timestamp: log.timestamp,
            coordinates: log.coordinates,
            address: log.address.clone(),
            maps_url: log.coordinates.map(|c| c.maps_url()),
        }
    }
}

/// Discriminator for [`NextActionDto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NextActionKind {
    /// Exactly one checkpoint may be recorded next.
    Require,
    /// The driver must pick another warehouse or the factory.
    Branch,
    /// The trip is finished.
    Complete,
    /// The stored history is corrupt; nothing may be recorded.
    Invalid,
}

/// One option offered at a branch.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BranchOptionDto {
    /// Value to send to the choice endpoint.
    pub choice: BranchChoice,
    /// Button label.
    pub label: String,
    /// Checkpoint this option leads to.
    pub checkpoint: CheckpointKind,
}

/// What the driver can do next.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NextActionDto {
    /// Action discriminator.
    pub action: NextActionKind,
    /// Required checkpoint for `require`.
    pub checkpoint: Option<CheckpointKind>,
    /// Button label for `require`.
    pub label: Option<String>,
    /// Options for `branch`.
    pub options: Vec<BranchOptionDto>,
    /// Human-readable description.
    pub message: String,
}

impl From<NextAction> for NextActionDto {
    fn from(next: NextAction) -> Self {
        let action = match next {
            NextAction::Require(_) => NextActionKind::Require,
            NextAction::Branch => NextActionKind::Branch,
            NextAction::Complete => NextActionKind::Complete,
            NextAction::Invalid(_) => NextActionKind::Invalid,
        };
        let options = if next == NextAction::Branch {
            BranchChoice::ALL
                .iter()
                .map(|choice| BranchOptionDto {
                    choice: *choice,
                    label: choice.label().to_string(),
                    checkpoint: choice.target(),
                })
                .collect()
        } else {
            Vec::new()
        };
        let checkpoint = next.required_kind();
        Self {
            action,
            checkpoint,
            label: checkpoint.map(|kind| kind.action_label().to_string()),
            options,
            message: next.to_string(),
        }
    }
}

/// Month/year filter. Missing values default to the current month/year
/// on the business clock.
#[derive(Debug, Clone, Copy, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct MonthQuery {
    /// Calendar month, 1-12.
    pub month: Option<u32>,
    /// Calendar year.
    pub year: Option<i32>,
}

impl MonthQuery {
    /// Returns `true` if neither filter was supplied.
    #[must_use]
    pub const fn is_unset(&self) -> bool {
        self.month.is_none() && self.year.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::GrammarViolation;

    #[test]
    fn branch_lists_both_options() {
        let dto = NextActionDto::from(NextAction::Branch);
        assert_eq!(dto.action, NextActionKind::Branch);
        assert_eq!(dto.checkpoint, None);
        let targets: Vec<CheckpointKind> = dto.options.iter().map(|o| o.checkpoint).collect();
        assert_eq!(
            targets,
            vec![CheckpointKind::ArrivalWarehouse, CheckpointKind::ArrivalFactory]
        );
    }

    #[test]
    fn require_carries_action_label() {
        let dto = NextActionDto::from(NextAction::Require(CheckpointKind::ExitFactory));
        assert_eq!(dto.action, NextActionKind::Require);
        assert_eq!(dto.label.as_deref(), Some("Log Exit Factory"));
        assert!(dto.options.is_empty());
    }

    #[test]
    fn invalid_history_offers_nothing() {
        let violation = GrammarViolation {
            index: 1,
            previous: Some(CheckpointKind::ExitFactory),
            found: CheckpointKind::ExitFactory,
        };
        let dto = NextActionDto::from(NextAction::Invalid(violation));
        assert_eq!(dto.action, NextActionKind::Invalid);
        assert_eq!(dto.checkpoint, None);
        assert!(dto.options.is_empty());
    }
}
