//! End-to-end trip workflow through the service layer.

#![allow(clippy::panic)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_test::assert_ok;
use tokio_util::sync::CancellationToken;

use checkpoint_gateway::config::business_offset;
use checkpoint_gateway::domain::{
    BranchChoice, CheckpointLog, Coordinates, DriverId, DriverProfile,
    NewCheckpoint, NextAction, Trip, TripId, TripRecord,
};
use checkpoint_gateway::error::GatewayError;
use checkpoint_gateway::location::{
    DisabledGeocoder, GeocodeError, LocationCapture, Position, PositionRequest, ReportedPosition,
    ReverseGeocoder, fallback_address,
};
use checkpoint_gateway::persistence::{
    CheckpointStore, InMemoryFleetDirectory, InMemoryTripStore,
};
use checkpoint_gateway::service::{TripHistoryAggregator, TripService, TripSession};

use checkpoint_gateway::domain::CheckpointKind::{
    ArrivalFactory, ArrivalWarehouse, ExitFactory, ExitWarehouse,
};

const WAREHOUSE: Coordinates = Coordinates::new(24.7136, 46.6753);

fn driver() -> DriverProfile {
    DriverProfile {
        id: DriverId::new(1),
        username: "driver1".to_string(),
        car: None,
    }
}

fn capture(geocoder: Arc<dyn ReverseGeocoder>) -> Arc<LocationCapture> {
    Arc::new(LocationCapture::new(
        geocoder,
        PositionRequest::default(),
        Duration::from_millis(200),
    ))
}

fn service(store: Arc<dyn CheckpointStore>) -> TripService {
    TripService::new(
        store,
        Arc::new(InMemoryFleetDirectory::new([driver()])),
        capture(Arc::new(DisabledGeocoder)),
    )
}

fn fix() -> ReportedPosition {
    ReportedPosition::Fix(Position::now(WAREHOUSE))
}

#[tokio::test]
async fn full_trip_with_two_warehouses() {
    let store = Arc::new(InMemoryTripStore::new());
    let trips = service(Arc::clone(&store) as Arc<dyn CheckpointStore>);
    let driver_id = DriverId::new(1);
    let cancel = CancellationToken::new();

    let started = assert_ok!(trips.start_trip(driver_id).await);
    assert_eq!(started.next, NextAction::Require(ExitFactory));

    for kind in [ExitFactory, ArrivalWarehouse, ExitWarehouse] {
        assert_ok!(trips.record_checkpoint(driver_id, kind, &fix(), &cancel).await);
    }

    let (_, next) = assert_ok!(
        trips
            .choose_branch(driver_id, BranchChoice::AnotherWarehouse)
            .await
    );
    assert_eq!(next, NextAction::Require(ArrivalWarehouse));

    for kind in [ArrivalWarehouse, ExitWarehouse] {
        assert_ok!(trips.record_checkpoint(driver_id, kind, &fix(), &cancel).await);
    }
    let finished = assert_ok!(
        trips
            .record_checkpoint(driver_id, ArrivalFactory, &fix(), &cancel)
            .await
    );
    assert!(finished.is_closed());
    assert!(!finished.record.is_active());

    // The driver is free again.
    assert!(matches!(
        trips.resume_trip(driver_id).await,
        Err(GatewayError::NoActiveTrip)
    ));

    let history = TripHistoryAggregator::new(store, business_offset(180));
    let month = assert_ok!(history.history_for(driver_id, None, None).await);
    let Some(summary) = month.trips.first() else {
        panic!("completed trip in history");
    };
    assert_eq!(summary.warehouse_count, 2);
    assert_eq!(summary.checkpoint_count, 6);
    assert_eq!(summary.route_text(), "🏭 → 📦 → 📦 → 🏭");
    assert_eq!(
        summary.checkpoints_by_kind.get(&ExitWarehouse).map(Vec::len),
        Some(2)
    );
}

#[tokio::test]
async fn resume_from_another_session_continues_where_it_stopped() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryTripStore::new());
    let cancel = CancellationToken::new();

    let first_device = service(Arc::clone(&store));
    let driver_id = DriverId::new(1);
    assert_ok!(first_device.start_trip(driver_id).await);
    for kind in [ExitFactory, ArrivalWarehouse] {
        assert_ok!(
            first_device
                .record_checkpoint(driver_id, kind, &fix(), &cancel)
                .await
        );
    }

    let mut second_device = TripSession::new(
        Arc::clone(&store),
        capture(Arc::new(DisabledGeocoder)),
        driver(),
    );
    let Some(view) = assert_ok!(second_device.resume().await) else {
        panic!("trip in progress");
    };
    assert_eq!(view.next, NextAction::Require(ExitWarehouse));
    assert_eq!(view.record.logs.len(), 2);

    // Either device may only record the derived next step.
    assert!(matches!(
        second_device.advance(ExitFactory, &fix(), &cancel).await,
        Err(GatewayError::OutOfSequence { .. })
    ));
    let view = assert_ok!(second_device.advance(ExitWarehouse, &fix(), &cancel).await);
    assert_eq!(view.next, NextAction::Branch);
}

/// Store whose appends fail while `failing` is set.
#[derive(Debug)]
struct FlakyStore {
    inner: InMemoryTripStore,
    failing: AtomicBool,
}

#[async_trait]
impl CheckpointStore for FlakyStore {
    async fn create_trip(
        &self,
        driver: &DriverProfile,
        start_date: DateTime<Utc>,
    ) -> Result<Trip, GatewayError> {
        self.inner.create_trip(driver, start_date).await
    }

    async fn append_checkpoint(
        &self,
        trip_id: TripId,
        checkpoint: NewCheckpoint,
    ) -> Result<CheckpointLog, GatewayError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(GatewayError::PersistenceError(
                "connection reset".to_string(),
            ));
        }
        self.inner.append_checkpoint(trip_id, checkpoint).await
    }

    async fn active_trip(&self, driver_id: DriverId) -> Result<Option<TripRecord>, GatewayError> {
        self.inner.active_trip(driver_id).await
    }

    async fn trip(&self, trip_id: TripId) -> Result<TripRecord, GatewayError> {
        self.inner.trip(trip_id).await
    }

    async fn trips_in_range(
        &self,
        driver_id: DriverId,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<TripRecord>, GatewayError> {
        self.inner.trips_in_range(driver_id, from, to).await
    }
}

#[tokio::test]
async fn failed_write_leaves_the_workflow_where_it_was() {
    let store = Arc::new(FlakyStore {
        inner: InMemoryTripStore::new(),
        failing: AtomicBool::new(false),
    });
    let mut session = TripSession::new(
        Arc::clone(&store) as Arc<dyn CheckpointStore>,
        capture(Arc::new(DisabledGeocoder)),
        driver(),
    );
    let cancel = CancellationToken::new();
    assert_ok!(session.start().await);
    assert_ok!(session.advance(ExitFactory, &fix(), &cancel).await);

    store.failing.store(true, Ordering::SeqCst);
    let Err(err) = session.advance(ArrivalWarehouse, &fix(), &cancel).await else {
        panic!("write must fail");
    };
    assert!(matches!(
        err,
        GatewayError::CheckpointWriteFailure {
            kind: ArrivalWarehouse,
            ..
        }
    ));
    assert!(err.is_retryable());
    assert_eq!(session.next_action(), Some(NextAction::Require(ArrivalWarehouse)));

    store.failing.store(false, Ordering::SeqCst);
    let view = assert_ok!(session.advance(ArrivalWarehouse, &fix(), &cancel).await);
    assert_eq!(view.record.logs.len(), 2);
    assert_eq!(view.next, NextAction::Require(ExitWarehouse));
}

#[derive(Debug)]
struct OfflineGeocoder;

#[async_trait]
impl ReverseGeocoder for OfflineGeocoder {
    async fn resolve(&self, _coordinates: Coordinates) -> Result<String, GeocodeError> {
        Err(GeocodeError::Transport("network unreachable".to_string()))
    }
}

#[tokio::test]
async fn geocoding_outage_records_coordinates() {
    let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryTripStore::new());
    let mut session = TripSession::new(store, capture(Arc::new(OfflineGeocoder)), driver());
    let cancel = CancellationToken::new();
    assert_ok!(session.start().await);

    let view = assert_ok!(session.advance(ExitFactory, &fix(), &cancel).await);
    let Some(log) = view.record.logs.first() else {
        panic!("checkpoint recorded");
    };
    assert_eq!(log.address.as_deref(), Some(fallback_address(WAREHOUSE).as_str()));
    assert_eq!(log.coordinates, Some(WAREHOUSE));
}
