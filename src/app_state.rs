//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use chrono::FixedOffset;

use crate::location::LocationCapture;
use crate::persistence::{CheckpointStore, FleetDirectory, TripAdminStore};
use crate::service::{AdminTripEditor, TripHistoryAggregator, TripService};

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Driver trip workflow.
    pub trips: Arc<TripService>,
    /// Monthly history for drivers.
    pub history: Arc<TripHistoryAggregator>,
    /// Privileged trip correction.
    pub admin: Arc<AdminTripEditor>,
    /// Clock used for month grouping and default filters.
    pub business_offset: FixedOffset,
}

impl AppState {
    /// Wires the services over one trip store.
    #[must_use]
    pub fn new<S>(
        store: Arc<S>,
        fleet: Arc<dyn FleetDirectory>,
        capture: Arc<LocationCapture>,
        business_offset: FixedOffset,
    ) -> Self
    where
        S: TripAdminStore + 'static,
    {
        let checkpoints: Arc<dyn CheckpointStore> = Arc::clone(&store) as Arc<dyn CheckpointStore>;
        let admin_store: Arc<dyn TripAdminStore> = store;
        Self {
            trips: Arc::new(TripService::new(
                Arc::clone(&checkpoints),
                Arc::clone(&fleet),
                capture,
            )),
            history: Arc::new(TripHistoryAggregator::new(checkpoints, business_offset)),
            admin: Arc::new(AdminTripEditor::new(admin_store, fleet, business_offset)),
            business_offset,
        }
    }
}
