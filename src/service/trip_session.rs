//! Live trip sessions: start, resume, branch choice, and checkpoint
//! recording for one driver.
//!
//! A session never trusts its own memory for "what comes next". After
//! every write it reloads the trip from the store and re-derives the next
//! action from the stored log list.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::domain::state_machine::next_action;
use crate::domain::{
    BranchChoice, CheckpointKind, DriverId, DriverProfile, NewCheckpoint, NextAction, TripId,
    TripRecord,
};
use crate::error::GatewayError;
use crate::location::{LocationCapture, PositionSource};
use crate::persistence::{CheckpointStore, FleetDirectory};

/// A trip as last loaded from the store, with the action derived from it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionView {
    /// The trip and its ordered checkpoint history.
    pub record: TripRecord,
    /// What the history requires next.
    pub next: NextAction,
}

impl SessionView {
    fn derive(record: TripRecord) -> Self {
        let next = next_action(&record.logs);
        Self { record, next }
    }

    /// Returns `true` once the trip reached its terminal checkpoint.
    #[must_use]
    pub const fn is_closed(&self) -> bool {
        self.next.is_complete()
    }
}

/// One driver's interaction with their current trip.
///
/// Steps take `&mut self`, so a session cannot start a second step before
/// the first one resolves.
#[derive(Debug)]
pub struct TripSession {
    store: Arc<dyn CheckpointStore>,
    capture: Arc<LocationCapture>,
    driver: DriverProfile,
    current: Option<SessionView>,
    branch: Option<BranchChoice>,
}

impl TripSession {
    /// Creates a session with no trip loaded. Call [`Self::start`] or
    /// [`Self::resume`] next.
    #[must_use]
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        capture: Arc<LocationCapture>,
        driver: DriverProfile,
    ) -> Self {
        Self {
            store,
            capture,
            driver,
            current: None,
            branch: None,
        }
    }

    /// The driver this session belongs to.
    #[must_use]
    pub const fn driver(&self) -> &DriverProfile {
        &self.driver
    }

    /// The trip as last loaded.
    #[must_use]
    pub const fn view(&self) -> Option<&SessionView> {
        self.current.as_ref()
    }

    /// The action to present, with a pending branch choice applied.
    #[must_use]
    pub fn next_action(&self) -> Option<NextAction> {
        let view = self.current.as_ref()?;
        Some(
            self.branch
                .and_then(|choice| view.next.resolve(choice))
                .unwrap_or(view.next),
        )
    }

    /// Returns `true` if the loaded trip is complete. A closed session
    /// offers no further actions.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.current.as_ref().is_some_and(SessionView::is_closed)
    }

    /// Starts a new trip.
    ///
    /// # Errors
    ///
    /// [`GatewayError::ActiveTripConflict`] if the driver already has a
    /// trip in progress; use [`Self::resume`] instead.
    pub async fn start(&mut self) -> Result<&SessionView, GatewayError> {
        let trip = self.store.create_trip(&self.driver, Utc::now()).await?;
        info!(trip_id = %trip.id, driver_id = %self.driver.id, "trip started");
        self.branch = None;
        Ok(&*self
            .current
            .insert(SessionView::derive(TripRecord::new(trip, Vec::new()))))
    }

    /// Loads the driver's in-progress trip and derives the next action
    /// from its stored history.
    ///
    /// Returns `None` when the driver has no trip in progress. A pending
    /// branch choice is discarded: after a reload the branch is offered
    /// again.
    ///
    /// # Errors
    ///
    /// [`GatewayError::PersistenceError`] on storage failure.
    pub async fn resume(&mut self) -> Result<Option<&SessionView>, GatewayError> {
        self.branch = None;
        let Some(record) = self.store.active_trip(self.driver.id).await? else {
            self.current = None;
            return Ok(None);
        };
        let view = SessionView::derive(record);
        if let NextAction::Invalid(violation) = view.next {
            error!(
                trip_id = %view.record.id(),
                %violation,
                "stored checkpoint history violates the workflow"
            );
        } else {
            debug!(trip_id = %view.record.id(), next = %view.next, "trip resumed");
        }
        Ok(Some(&*self.current.insert(view)))
    }

    /// Records the driver's answer at the branch point. Writes nothing.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NoActiveTrip`] if no trip is loaded.
    /// - [`GatewayError::InvalidRequest`] if the trip is not at a branch.
    pub fn choose(&mut self, choice: BranchChoice) -> Result<NextAction, GatewayError> {
        let view = self.current.as_ref().ok_or(GatewayError::NoActiveTrip)?;
        let resolved = view.next.resolve(choice).ok_or_else(|| {
            GatewayError::InvalidRequest(format!(
                "no branch decision pending; next step is {}",
                view.next
            ))
        })?;
        debug!(trip_id = %view.record.id(), choice = choice.label(), "branch chosen");
        self.branch = Some(choice);
        Ok(resolved)
    }

    /// Captures the position, resolves the address, appends the
    /// checkpoint, and re-derives the next action from the reloaded trip.
    ///
    /// On any failure the session keeps its previous view, so the same
    /// action is presented again.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::NoActiveTrip`] if no trip is loaded.
    /// - [`GatewayError::TripCompleted`] if the trip is closed.
    /// - [`GatewayError::GrammarViolation`] if the stored history is
    ///   corrupt.
    /// - [`GatewayError::OutOfSequence`] if `kind` is not the next step.
    /// - Location errors from [`LocationCapture::acquire`], including
    ///   [`GatewayError::LocationCancelled`] if `cancel` fires before the
    ///   write.
    /// - [`GatewayError::CheckpointWriteFailure`] if the store failed.
    pub async fn advance(
        &mut self,
        kind: CheckpointKind,
        source: &dyn PositionSource,
        cancel: &CancellationToken,
    ) -> Result<&SessionView, GatewayError> {
        let view = self.current.as_ref().ok_or(GatewayError::NoActiveTrip)?;
        let trip_id = view.record.id();
        let expected = self.next_action().unwrap_or(view.next);
        match expected {
            NextAction::Complete => return Err(GatewayError::TripCompleted(trip_id)),
            NextAction::Invalid(violation) => {
                return Err(GatewayError::GrammarViolation { trip_id, violation });
            }
            next if !next.admits(kind) => {
                return Err(GatewayError::OutOfSequence {
                    expected: next,
                    got: kind,
                });
            }
            _ => {}
        }

        let position = self.capture.acquire(source, cancel).await.map_err(|err| {
            warn!(%trip_id, kind = %kind, error = %err, "position capture failed");
            GatewayError::from(err)
        })?;
        let address = self.capture.resolve_address(&position).await;

        if cancel.is_cancelled() {
            warn!(%trip_id, kind = %kind, "checkpoint abandoned before write");
            return Err(GatewayError::LocationCancelled);
        }

        let checkpoint = NewCheckpoint {
            kind,
            coordinates: Some(position.coordinates),
            address: Some(address),
        };
        let log = match self.store.append_checkpoint(trip_id, checkpoint).await {
            Ok(log) => log,
            Err(GatewayError::PersistenceError(reason)) => {
                warn!(%trip_id, kind = %kind, %reason, "checkpoint write failed");
                return Err(GatewayError::CheckpointWriteFailure { kind, reason });
            }
            Err(
                err @ (GatewayError::OutOfSequence { .. }
                | GatewayError::TripCompleted(_)
                | GatewayError::GrammarViolation { .. }),
            ) => {
                // Another device moved the trip on; show what it did.
                warn!(%trip_id, kind = %kind, error = %err, "checkpoint rejected by store");
                if let Err(reload) = self.reload(trip_id).await {
                    warn!(%trip_id, error = %reload, "reload after rejection failed");
                }
                return Err(err);
            }
            Err(err) => return Err(err),
        };
        info!(
            %trip_id,
            log_id = %log.id,
            kind = %kind,
            address = log.address.as_deref().unwrap_or_default(),
            "checkpoint recorded"
        );

        let view = self.reload(trip_id).await?;
        if view.is_closed() {
            info!(%trip_id, "trip completed");
        }
        Ok(view)
    }

    async fn reload(&mut self, trip_id: TripId) -> Result<&SessionView, GatewayError> {
        self.branch = None;
        match self.store.trip(trip_id).await {
            Ok(record) => Ok(&*self.current.insert(SessionView::derive(record))),
            Err(err) => {
                // The write may have landed; force a resume before the next step.
                self.current = None;
                Err(err)
            }
        }
    }
}

/// Builds [`TripSession`]s for drivers known to the fleet directory.
///
/// HTTP requests are independent, so each one resumes a fresh session
/// from the store.
#[derive(Debug, Clone)]
pub struct TripService {
    store: Arc<dyn CheckpointStore>,
    fleet: Arc<dyn FleetDirectory>,
    capture: Arc<LocationCapture>,
}

impl TripService {
    /// Creates a new `TripService`.
    #[must_use]
    pub fn new(
        store: Arc<dyn CheckpointStore>,
        fleet: Arc<dyn FleetDirectory>,
        capture: Arc<LocationCapture>,
    ) -> Self {
        Self {
            store,
            fleet,
            capture,
        }
    }

    /// The capture pipeline shared by all sessions.
    #[must_use]
    pub fn capture(&self) -> &LocationCapture {
        &self.capture
    }

    /// Opens an empty session for `driver_id`.
    ///
    /// # Errors
    ///
    /// [`GatewayError::DriverNotFound`] if the fleet directory does not
    /// know the driver.
    pub async fn session(&self, driver_id: DriverId) -> Result<TripSession, GatewayError> {
        let driver = self
            .fleet
            .driver(driver_id)
            .await?
            .ok_or(GatewayError::DriverNotFound(driver_id))?;
        Ok(TripSession::new(
            Arc::clone(&self.store),
            Arc::clone(&self.capture),
            driver,
        ))
    }

    /// Starts a trip for `driver_id`.
    ///
    /// # Errors
    ///
    /// See [`TripSession::start`] and [`Self::session`].
    pub async fn start_trip(&self, driver_id: DriverId) -> Result<SessionView, GatewayError> {
        let mut session = self.session(driver_id).await?;
        session.start().await.cloned()
    }

    /// Loads the driver's in-progress trip.
    ///
    /// # Errors
    ///
    /// [`GatewayError::NoActiveTrip`] if there is none.
    pub async fn resume_trip(&self, driver_id: DriverId) -> Result<SessionView, GatewayError> {
        let mut session = self.session(driver_id).await?;
        session
            .resume()
            .await?
            .cloned()
            .ok_or(GatewayError::NoActiveTrip)
    }

    /// Resolves a branch decision on the driver's in-progress trip.
    ///
    /// # Errors
    ///
    /// See [`TripSession::choose`].
    pub async fn choose_branch(
        &self,
        driver_id: DriverId,
        choice: BranchChoice,
    ) -> Result<(SessionView, NextAction), GatewayError> {
        let mut session = self.session(driver_id).await?;
        let view = session
            .resume()
            .await?
            .cloned()
            .ok_or(GatewayError::NoActiveTrip)?;
        let next = session.choose(choice)?;
        Ok((view, next))
    }

    /// Records `kind` on the driver's in-progress trip.
    ///
    /// # Errors
    ///
    /// See [`TripSession::advance`].
    pub async fn record_checkpoint(
        &self,
        driver_id: DriverId,
        kind: CheckpointKind,
        source: &dyn PositionSource,
        cancel: &CancellationToken,
    ) -> Result<SessionView, GatewayError> {
        let mut session = self.session(driver_id).await?;
        if session.resume().await?.is_none() {
            return Err(GatewayError::NoActiveTrip);
        }
        session.advance(kind, source, cancel).await.cloned()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::time::Duration;

    use tokio_test::assert_ok;

    use super::*;
    use crate::domain::Coordinates;
    use crate::location::{DisabledGeocoder, LocationError, Position, PositionRequest, ReportedPosition};
    use crate::persistence::{InMemoryFleetDirectory, InMemoryTripStore};
    use crate::domain::CheckpointKind::{
        ArrivalFactory, ArrivalWarehouse, ExitFactory, ExitWarehouse,
    };

    fn driver() -> DriverProfile {
        DriverProfile {
            id: DriverId::new(1),
            username: "driver1".to_string(),
            car: None,
        }
    }

    fn capture() -> Arc<LocationCapture> {
        Arc::new(LocationCapture::new(
            Arc::new(DisabledGeocoder),
            PositionRequest::default(),
            Duration::from_millis(100),
        ))
    }

    fn fix() -> ReportedPosition {
        ReportedPosition::Fix(Position::now(Coordinates::new(24.7136, 46.6753)))
    }

    fn session(store: &Arc<InMemoryTripStore>) -> TripSession {
        TripSession::new(Arc::clone(store) as Arc<dyn CheckpointStore>, capture(), driver())
    }

    #[tokio::test]
    async fn start_requires_exit_factory() {
        let store = Arc::new(InMemoryTripStore::new());
        let mut session = session(&store);
        let view = assert_ok!(session.start().await);
        assert_eq!(view.next, NextAction::Require(ExitFactory));
        assert!(view.record.logs.is_empty());
    }

    #[tokio::test]
    async fn advance_walks_the_workflow_and_closes() {
        let store = Arc::new(InMemoryTripStore::new());
        let mut session = session(&store);
        assert_ok!(session.start().await);
        let cancel = CancellationToken::new();

        for (kind, expected) in [
            (ExitFactory, NextAction::Require(ArrivalWarehouse)),
            (ArrivalWarehouse, NextAction::Require(ExitWarehouse)),
            (ExitWarehouse, NextAction::Branch),
        ] {
            let view = assert_ok!(session.advance(kind, &fix(), &cancel).await);
            assert_eq!(view.next, expected);
        }

        assert_eq!(
            assert_ok!(session.choose(BranchChoice::ReturnToFactory)),
            NextAction::Require(ArrivalFactory)
        );
        let view = assert_ok!(session.advance(ArrivalFactory, &fix(), &cancel).await);
        assert_eq!(view.next, NextAction::Complete);
        assert!(session.is_closed());

        let again = session.advance(ArrivalFactory, &fix(), &cancel).await;
        assert!(matches!(again, Err(GatewayError::TripCompleted(_))));
    }

    #[tokio::test]
    async fn choice_constrains_the_next_checkpoint() {
        let store = Arc::new(InMemoryTripStore::new());
        let mut session = session(&store);
        assert_ok!(session.start().await);
        let cancel = CancellationToken::new();
        for kind in [ExitFactory, ArrivalWarehouse, ExitWarehouse] {
            assert_ok!(session.advance(kind, &fix(), &cancel).await);
        }
        assert_ok!(session.choose(BranchChoice::AnotherWarehouse));
        let result = session.advance(ArrivalFactory, &fix(), &cancel).await;
        assert!(matches!(
            result,
            Err(GatewayError::OutOfSequence {
                expected: NextAction::Require(ArrivalWarehouse),
                got: ArrivalFactory,
            })
        ));
    }

    #[tokio::test]
    async fn choose_outside_branch_is_rejected() {
        let store = Arc::new(InMemoryTripStore::new());
        let mut session = session(&store);
        assert!(matches!(
            session.choose(BranchChoice::AnotherWarehouse),
            Err(GatewayError::NoActiveTrip)
        ));
        assert_ok!(session.start().await);
        assert!(matches!(
            session.choose(BranchChoice::AnotherWarehouse),
            Err(GatewayError::InvalidRequest(_))
        ));
    }

    #[tokio::test]
    async fn location_failure_writes_nothing() {
        let store = Arc::new(InMemoryTripStore::new());
        let mut session = session(&store);
        let trip_id = assert_ok!(session.start().await).record.id();
        let denied = ReportedPosition::Failed(LocationError::PermissionDenied);
        let result = session
            .advance(ExitFactory, &denied, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(GatewayError::LocationPermissionDenied)));
        assert_eq!(session.next_action(), Some(NextAction::Require(ExitFactory)));
        assert!(assert_ok!(store.trip(trip_id).await).logs.is_empty());
    }

    #[tokio::test]
    async fn cancelled_capture_writes_nothing() {
        let store = Arc::new(InMemoryTripStore::new());
        let mut session = session(&store);
        let trip_id = assert_ok!(session.start().await).record.id();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = session.advance(ExitFactory, &fix(), &cancel).await;
        assert!(matches!(result, Err(GatewayError::LocationCancelled)));
        assert!(assert_ok!(store.trip(trip_id).await).logs.is_empty());
        assert_eq!(session.next_action(), Some(NextAction::Require(ExitFactory)));
    }

    #[tokio::test]
    async fn resume_discards_branch_choice() {
        let store = Arc::new(InMemoryTripStore::new());
        let mut session = session(&store);
        assert_ok!(session.start().await);
        let cancel = CancellationToken::new();
        for kind in [ExitFactory, ArrivalWarehouse, ExitWarehouse] {
            assert_ok!(session.advance(kind, &fix(), &cancel).await);
        }
        assert_ok!(session.choose(BranchChoice::ReturnToFactory));
        let Some(view) = assert_ok!(session.resume().await) else {
            panic!("trip should resume");
        };
        assert_eq!(view.next, NextAction::Branch);
        assert_eq!(session.next_action(), Some(NextAction::Branch));
    }

    #[tokio::test]
    async fn service_requires_known_driver() {
        let store: Arc<dyn CheckpointStore> = Arc::new(InMemoryTripStore::new());
        let fleet = Arc::new(InMemoryFleetDirectory::new([driver()]));
        let service = TripService::new(store, fleet, capture());
        assert!(matches!(
            service.start_trip(DriverId::new(99)).await,
            Err(GatewayError::DriverNotFound(_))
        ));
        assert!(matches!(
            service.resume_trip(DriverId::new(1)).await,
            Err(GatewayError::NoActiveTrip)
        ));
        let started = assert_ok!(service.start_trip(DriverId::new(1)).await);
        let resumed = assert_ok!(service.resume_trip(DriverId::new(1)).await);
        assert_eq!(started, resumed);
    }
}
