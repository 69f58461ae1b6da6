//! Per-trip summaries and monthly grouping of completed trips.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, TimeDelta, Utc};

use crate::domain::{CheckpointKind, DriverId, MonthPeriod, NextAction, Trip, TripRecord};
use crate::domain::state_machine::next_action;
use crate::error::GatewayError;
use crate::persistence::CheckpointStore;

/// Text shown when a trip has no measurable duration.
pub const NOT_APPLICABLE: &str = "N/A";

/// One stop on a trip's route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStop {
    /// The factory (start and end of every trip).
    Factory,
    /// The n-th warehouse visit, counted from 1.
    Warehouse(usize),
}

impl RouteStop {
    /// Compact glyph used in route strips.
    #[must_use]
    pub const fn glyph(self) -> &'static str {
        match self {
            Self::Factory => "🏭",
            Self::Warehouse(_) => "📦",
        }
    }
}

impl fmt::Display for RouteStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Factory => f.write_str("Factory"),
            Self::Warehouse(n) => write!(f, "Warehouse {n}"),
        }
    }
}

/// One recorded occurrence of a checkpoint kind.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointEntry {
    /// When it was recorded.
    pub timestamp: DateTime<Utc>,
    /// Recorded address.
    pub address: Option<String>,
}

/// Derived figures for one trip.
#[derive(Debug, Clone, PartialEq)]
pub struct TripSummary {
    /// Trip header.
    pub trip: Trip,
    /// Time between the first and last checkpoint; `None` with fewer
    /// than two checkpoints.
    pub duration: Option<TimeDelta>,
    /// Number of `Arrival at Warehouse` checkpoints.
    pub warehouse_count: usize,
    /// Factory, one stop per warehouse visit, factory.
    pub route: Vec<RouteStop>,
    /// Number of recorded checkpoints.
    pub checkpoint_count: usize,
    /// Most recent checkpoint kind.
    pub last_checkpoint: Option<CheckpointKind>,
    /// Workflow position derived from the history.
    pub next: NextAction,
    /// Every checkpoint grouped by kind, in time order within each kind.
    pub checkpoints_by_kind: BTreeMap<CheckpointKind, Vec<CheckpointEntry>>,
}

impl TripSummary {
    /// Duration as `"{h}h {m}m"`, or `"N/A"`.
    #[must_use]
    pub fn duration_text(&self) -> String {
        self.duration
            .map_or_else(|| NOT_APPLICABLE.to_string(), format_duration)
    }

    /// Route as a glyph strip, e.g. `🏭 → 📦 → 📦 → 🏭`.
    #[must_use]
    pub fn route_text(&self) -> String {
        self.route
            .iter()
            .map(|stop| stop.glyph())
            .collect::<Vec<_>>()
            .join(" → ")
    }

    /// Status line for listings: the last checkpoint label, or
    /// `"Started"` for a trip with no checkpoints yet.
    #[must_use]
    pub fn last_state_label(&self) -> &'static str {
        self.last_checkpoint.map_or("Started", CheckpointKind::label)
    }
}

/// Completed trips for one month, newest first.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyHistory {
    /// The month covered.
    pub period: MonthPeriod,
    /// Trip summaries, newest first.
    pub trips: Vec<TripSummary>,
}

impl MonthlyHistory {
    /// Total warehouse visits across the month.
    #[must_use]
    pub fn warehouse_visits(&self) -> usize {
        self.trips.iter().map(|t| t.warehouse_count).sum()
    }

    /// Sum of measurable trip durations.
    #[must_use]
    pub fn total_duration(&self) -> TimeDelta {
        self.trips
            .iter()
            .filter_map(|t| t.duration)
            .fold(TimeDelta::zero(), |acc, d| acc + d)
    }
}

/// Formats a duration as whole hours and minutes, e.g. `"2h 30m"`.
#[must_use]
pub fn format_duration(duration: TimeDelta) -> String {
    let minutes = duration.num_minutes().max(0);
    format!("{}h {}m", minutes / 60, minutes % 60)
}

/// Builds trip summaries and monthly histories from stored trips.
///
/// Read-only: summaries are recomputed from the log list on every call.
#[derive(Debug, Clone)]
pub struct TripHistoryAggregator {
    store: Arc<dyn CheckpointStore>,
    offset: FixedOffset,
}

impl TripHistoryAggregator {
    /// Creates an aggregator grouping by months on the `offset` clock.
    #[must_use]
    pub fn new(store: Arc<dyn CheckpointStore>, offset: FixedOffset) -> Self {
        Self { store, offset }
    }

    /// Business clock offset.
    #[must_use]
    pub const fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Summarizes one trip.
    #[must_use]
    pub fn summarize(record: &TripRecord) -> TripSummary {
        let duration = match (record.logs.first(), record.logs.last()) {
            (Some(first), Some(last)) if record.logs.len() >= 2 => {
                Some(last.timestamp - first.timestamp)
            }
            _ => None,
        };

        let warehouse_count = record
            .kinds()
            .filter(|kind| *kind == CheckpointKind::ArrivalWarehouse)
            .count();

        let mut route = Vec::with_capacity(warehouse_count + 2);
        route.push(RouteStop::Factory);
        route.extend((1..=warehouse_count).map(RouteStop::Warehouse));
        route.push(RouteStop::Factory);

        let mut checkpoints_by_kind: BTreeMap<CheckpointKind, Vec<CheckpointEntry>> =
            BTreeMap::new();
        for log in &record.logs {
            checkpoints_by_kind
                .entry(log.kind)
                .or_default()
                .push(CheckpointEntry {
                    timestamp: log.timestamp,
                    address: log.address.clone(),
                });
        }

        TripSummary {
            trip: record.trip.clone(),
            duration,
            warehouse_count,
            route,
            checkpoint_count: record.logs.len(),
            last_checkpoint: record.last_log().map(|log| log.kind),
            next: next_action(&record.logs),
            checkpoints_by_kind,
        }
    }

    /// Groups trips by the month of their start date, newest month first.
    #[must_use]
    pub fn group_by_month(records: &[TripRecord], offset: FixedOffset) -> Vec<MonthlyHistory> {
        let mut months: BTreeMap<MonthPeriod, Vec<&TripRecord>> = BTreeMap::new();
        for record in records {
            months
                .entry(MonthPeriod::containing(record.trip.start_date, offset))
                .or_default()
                .push(record);
        }
        months
            .into_iter()
            .rev()
            .map(|(period, mut records)| {
                records.sort_by(|a, b| {
                    b.trip
                        .start_date
                        .cmp(&a.trip.start_date)
                        .then(b.id().cmp(&a.id()))
                });
                MonthlyHistory {
                    period,
                    trips: records.into_iter().map(Self::summarize).collect(),
                }
            })
            .collect()
    }

    /// The driver's completed trips started in `period`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on storage failure.
    pub async fn monthly_history(
        &self,
        driver_id: DriverId,
        period: MonthPeriod,
    ) -> Result<MonthlyHistory, GatewayError> {
        let (from, to) = period.utc_range(self.offset)?;
        let records = self.store.trips_in_range(driver_id, from, to).await?;
        let trips: Vec<TripSummary> = records
            .iter()
            .filter(|record| !record.is_active())
            .map(Self::summarize)
            .collect();
        tracing::debug!(%driver_id, %period, trips = trips.len(), "history aggregated");
        Ok(MonthlyHistory { period, trips })
    }

    /// Like [`Self::monthly_history`], with missing filters defaulting to
    /// the current month and year on the business clock.
    ///
    /// # Errors
    ///
    /// [`GatewayError::InvalidRequest`] for a month outside 1-12.
    pub async fn history_for(
        &self,
        driver_id: DriverId,
        month: Option<u32>,
        year: Option<i32>,
    ) -> Result<MonthlyHistory, GatewayError> {
        let period = MonthPeriod::from_filters(month, year, self.offset)?;
        self.monthly_history(driver_id, period).await
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use chrono::TimeZone;
    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::{CheckpointLog, DriverRef, LogId, TripId, TripStatus};
    use crate::domain::CheckpointKind::{
        ArrivalFactory, ArrivalWarehouse, ExitFactory, ExitWarehouse,
    };

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        let Some(t) = Utc.with_ymd_and_hms(2026, 4, day, hour, minute, 0).single() else {
            panic!("valid timestamp");
        };
        t
    }

    fn record(id: i64, start: DateTime<Utc>, logs: &[(CheckpointKind, DateTime<Utc>)]) -> TripRecord {
        let trip = Trip {
            id: TripId::new(id),
            driver: DriverRef {
                id: DriverId::new(1),
                username: "driver1".to_string(),
            },
            car: None,
            start_date: start,
            status: TripStatus::Completed,
        };
        let logs = logs
            .iter()
            .zip(1_i64..)
            .map(|((kind, timestamp), n)| CheckpointLog {
                id: LogId::new(id * 100 + n),
                trip_id: TripId::new(id),
                kind: *kind,
                timestamp: *timestamp,
                coordinates: None,
                address: Some(format!("{kind} #{n}")),
            })
            .collect();
        TripRecord::new(trip, logs)
    }

    fn riyadh() -> FixedOffset {
        crate::config::business_offset(180)
    }

    #[test]
    fn duration_between_first_and_last_checkpoint() {
        let trip = record(
            1,
            at(2, 8, 55),
            &[(ExitFactory, at(2, 9, 0)), (ArrivalFactory, at(2, 11, 30))],
        );
        let summary = TripHistoryAggregator::summarize(&trip);
        assert_eq!(summary.duration_text(), "2h 30m");
    }

    #[test]
    fn fewer_than_two_checkpoints_has_no_duration() {
        let empty = TripHistoryAggregator::summarize(&record(1, at(2, 9, 0), &[]));
        let single =
            TripHistoryAggregator::summarize(&record(2, at(2, 9, 0), &[(ExitFactory, at(2, 9, 0))]));
        assert_eq!(empty.duration, None);
        assert_eq!(empty.duration_text(), NOT_APPLICABLE);
        assert_eq!(single.duration_text(), NOT_APPLICABLE);
        assert_eq!(empty.last_state_label(), "Started");
    }

    #[test]
    fn warehouse_count_and_route() {
        let trip = record(
            1,
            at(3, 7, 0),
            &[
                (ExitFactory, at(3, 7, 0)),
                (ArrivalWarehouse, at(3, 8, 0)),
                (ExitWarehouse, at(3, 8, 30)),
                (ArrivalWarehouse, at(3, 9, 15)),
                (ExitWarehouse, at(3, 9, 45)),
                (ArrivalFactory, at(3, 11, 0)),
            ],
        );
        let summary = TripHistoryAggregator::summarize(&trip);
        assert_eq!(summary.warehouse_count, 2);
        assert_eq!(
            summary.route,
            vec![
                RouteStop::Factory,
                RouteStop::Warehouse(1),
                RouteStop::Warehouse(2),
                RouteStop::Factory
            ]
        );
        assert_eq!(summary.route_text(), "🏭 → 📦 → 📦 → 🏭");
        assert_eq!(summary.duration_text(), "4h 0m");
        assert_eq!(summary.next, NextAction::Complete);
        assert_eq!(summary.last_state_label(), "Arrival at Factory");

        let Some(arrivals) = summary.checkpoints_by_kind.get(&ArrivalWarehouse) else {
            panic!("arrivals grouped");
        };
        assert_eq!(arrivals.len(), 2);
        assert!(arrivals.windows(2).all(|w| match w {
            [a, b] => a.timestamp <= b.timestamp,
            _ => true,
        }));
    }

    #[test]
    fn summaries_are_idempotent() {
        let trip = record(
            1,
            at(3, 7, 0),
            &[(ExitFactory, at(3, 7, 0)), (ArrivalWarehouse, at(3, 8, 0))],
        );
        assert_eq!(
            TripHistoryAggregator::summarize(&trip),
            TripHistoryAggregator::summarize(&trip)
        );
    }

    #[test]
    fn grouping_uses_business_month_newest_first() {
        // 22:00 UTC on 30 April is 1 May in UTC+3.
        let late_april = record(1, at(30, 22, 0), &[]);
        let mid_april = record(2, at(15, 9, 0), &[]);
        let early_april = record(3, at(1, 9, 0), &[]);
        let months = TripHistoryAggregator::group_by_month(
            &[early_april, late_april, mid_april],
            riyadh(),
        );
        let periods: Vec<String> = months.iter().map(|m| m.period.to_string()).collect();
        assert_eq!(periods, vec!["2026-05", "2026-04"]);
        let Some(april) = months.get(1) else {
            panic!("april present");
        };
        let ids: Vec<i64> = april.trips.iter().map(|t| t.trip.id.get()).collect();
        assert_eq!(ids, vec![2, 3]);
    }

    #[tokio::test]
    async fn monthly_history_skips_trips_in_progress() {
        use crate::domain::{DriverProfile, NewCheckpoint};
        use crate::persistence::InMemoryTripStore;

        let store = Arc::new(InMemoryTripStore::new());
        let driver = DriverProfile {
            id: DriverId::new(1),
            username: "driver1".to_string(),
            car: None,
        };
        let done = assert_ok!(store.create_trip(&driver, Utc::now()).await);
        for kind in [ExitFactory, ArrivalWarehouse, ExitWarehouse, ArrivalFactory] {
            assert_ok!(
                store
                    .append_checkpoint(
                        done.id,
                        NewCheckpoint {
                            kind,
                            coordinates: None,
                            address: None,
                        }
                    )
                    .await
            );
        }
        let open = assert_ok!(store.create_trip(&driver, Utc::now()).await);

        let aggregator = TripHistoryAggregator::new(store, riyadh());
        let history = assert_ok!(aggregator.history_for(DriverId::new(1), None, None).await);
        let ids: Vec<TripId> = history.trips.iter().map(|t| t.trip.id).collect();
        assert_eq!(ids, vec![done.id]);
        assert!(!ids.contains(&open.id));
        assert_eq!(history.warehouse_visits(), 1);
        assert!(aggregator.history_for(DriverId::new(1), Some(13), None).await.is_err());
    }
}
