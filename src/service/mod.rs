//! Service layer: business logic orchestration.
//!
//! - [`TripService`] / [`TripSession`] drive a driver's live trip.
//! - [`TripHistoryAggregator`] summarizes completed trips by month.
//! - [`AdminTripEditor`] is the privileged correction path.

pub mod admin_editor;
pub mod history;
pub mod trip_session;

pub use admin_editor::{AdminTripEditor, TripDetail, TripEdit};
pub use history::{
    CheckpointEntry, MonthlyHistory, RouteStop, TripHistoryAggregator, TripSummary,
    format_duration,
};
pub use trip_session::{SessionView, TripService, TripSession};
