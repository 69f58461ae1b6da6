//! Domain layer: trips, checkpoints, and the checkpoint state machine.
//!
//! Everything here is plain data plus pure functions. Storage, location
//! capture, and orchestration live in the layers above.

pub mod checkpoint;
pub mod edit;
pub mod ids;
pub mod period;
pub mod state_machine;
pub mod trip;

pub use checkpoint::{CheckpointKind, CheckpointLog, Coordinates, NewCheckpoint};
pub use edit::{LogUpdate, TripUpdate};
pub use ids::{DriverId, LogId, TripId};
pub use period::MonthPeriod;
pub use state_machine::{BranchChoice, GrammarViolation, NextAction};
pub use trip::{CarSnapshot, DriverProfile, DriverRef, Trip, TripRecord, TripStatus};
