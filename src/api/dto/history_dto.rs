//! Trip summary and monthly history DTOs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::TripDto;
use crate::service::{MonthlyHistory, TripSummary, format_duration};

/// One checkpoint occurrence inside a per-kind rollup.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CheckpointEntryDto {
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
    /// Recorded address.
    pub address: Option<String>,
}

/// Derived figures for one trip.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TripSummaryDto {
    /// Trip header.
    pub trip: TripDto,
    /// Whole minutes between first and last checkpoint.
    pub duration_minutes: Option<i64>,
    /// `"{h}h {m}m"` or `"N/A"`.
    pub duration: String,
    /// Warehouse visits.
    pub warehouse_count: usize,
    /// Route strip, e.g. `🏭 → 📦 → 🏭`.
    pub route: String,
    /// Route stop names in order.
    pub stops: Vec<String>,
    /// Number of checkpoints.
    pub checkpoint_count: usize,
    /// Last checkpoint label, or `"Started"`.
    pub last_state: String,
    /// Checkpoints keyed by kind label.
    pub checkpoints_by_kind: BTreeMap<String, Vec<CheckpointEntryDto>>,
}

impl From<&TripSummary> for TripSummaryDto {
    fn from(summary: &TripSummary) -> Self {
        Self {
            trip: TripDto::from(&summary.trip),
            duration_minutes: summary.duration.map(|d| d.num_minutes()),
            duration: summary.duration_text(),
            warehouse_count: summary.warehouse_count,
            route: summary.route_text(),
            stops: summary.route.iter().map(ToString::to_string).collect(),
            checkpoint_count: summary.checkpoint_count,
            last_state: summary.last_state_label().to_string(),
            checkpoints_by_kind: summary
                .checkpoints_by_kind
                .iter()
                .map(|(kind, entries)| {
                    let entries = entries
                        .iter()
                        .map(|entry| CheckpointEntryDto {
                            timestamp: entry.timestamp,
                            address: entry.address.clone(),
                        })
                        .collect();
                    (kind.label().to_string(), entries)
                })
                .collect(),
        }
    }
}

/// Trips for one month.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MonthlyHistoryResponse {
    /// Calendar year.
    pub year: i32,
    /// Calendar month, 1-12.
    pub month: u32,
    /// Number of trips.
    pub trip_count: usize,
    /// Warehouse visits across all trips.
    pub warehouse_visits: usize,
    /// Total measurable driving time.
    pub total_duration: String,
    /// Trip summaries, newest first.
    pub trips: Vec<TripSummaryDto>,
}

impl From<&MonthlyHistory> for MonthlyHistoryResponse {
    fn from(history: &MonthlyHistory) -> Self {
        Self {
            year: history.period.year,
            month: history.period.month,
            trip_count: history.trips.len(),
            warehouse_visits: history.warehouse_visits(),
            total_duration: format_duration(history.total_duration()),
            trips: history.trips.iter().map(TripSummaryDto::from).collect(),
        }
    }
}
