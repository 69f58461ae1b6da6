//! # checkpoint-gateway
//!
//! Checkpoint workflow engine and REST gateway for delivery trips that
//! leave a factory, visit one or more warehouses, and return.
//!
//! The "current step" of a trip is never stored. It is re-derived on every
//! request from the ordered checkpoint history, so a driver can resume a
//! trip after an app restart, a device change, or a reinstall without any
//! client-side state.
//!
//! ## Architecture
//!
//! ```text
//! Clients (driver app, admin dashboard)
//!     │
//!     ├── REST Handlers (api/)
//!     │
//!     ├── TripSession / TripService (service/)
//!     ├── TripHistoryAggregator (service/)
//!     ├── AdminTripEditor (service/)
//!     │
//!     ├── LocationCapture + ReverseGeocoder (location/)
//!     ├── Checkpoint state machine (domain/)
//!     │
//!     └── Trip store: in-memory or PostgreSQL (persistence/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod location;
pub mod persistence;
pub mod service;
