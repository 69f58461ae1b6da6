//! Driver trip handlers: start, resume, branch choice, checkpoint capture.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use tokio_util::sync::CancellationToken;

use crate::api::dto::{
    CheckpointRequest, ChoiceRequest, ChoiceResponse, NextActionDto, TripViewResponse,
};
use crate::api::extract::DriverIdentity;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `POST /trips` — Start a trip.
///
/// # Errors
///
/// Returns [`GatewayError::ActiveTripConflict`] if the driver already has
/// a trip in progress.
#[utoipa::path(
    post,
    path = "/api/v1/trips",
    tag = "Trips",
    summary = "Start a trip",
    description = "Creates an in-progress trip for the calling driver with an empty checkpoint history. The first required checkpoint is `Exit Factory`.",
    params(("x-driver-id" = i64, Header, description = "Calling driver")),
    responses(
        (status = 201, description = "Trip started", body = TripViewResponse),
        (status = 404, description = "Unknown driver", body = ErrorResponse),
        (status = 409, description = "Driver already has a trip in progress", body = ErrorResponse),
    )
)]
pub async fn start_trip(
    State(state): State<AppState>,
    DriverIdentity(driver_id): DriverIdentity,
) -> Result<impl IntoResponse, GatewayError> {
    let view = state.trips.start_trip(driver_id).await?;
    Ok((StatusCode::CREATED, Json(TripViewResponse::from(&view))))
}

/// `GET /trips/active` — Resume the in-progress trip.
///
/// # Errors
///
/// Returns [`GatewayError::NoActiveTrip`] if there is none.
#[utoipa::path(
    get,
    path = "/api/v1/trips/active",
    tag = "Trips",
    summary = "Resume the active trip",
    description = "Loads the calling driver's in-progress trip and derives the next action from its stored checkpoints.",
    params(("x-driver-id" = i64, Header, description = "Calling driver")),
    responses(
        (status = 200, description = "Active trip", body = TripViewResponse),
        (status = 404, description = "No trip in progress", body = ErrorResponse),
    )
)]
pub async fn active_trip(
    State(state): State<AppState>,
    DriverIdentity(driver_id): DriverIdentity,
) -> Result<impl IntoResponse, GatewayError> {
    let view = state.trips.resume_trip(driver_id).await?;
    Ok(Json(TripViewResponse::from(&view)))
}

/// `POST /trips/active/choice` — Resolve a branch decision.
///
/// Nothing is written; the response names the single checkpoint to
/// record next.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] if the trip is not at a branch.
#[utoipa::path(
    post,
    path = "/api/v1/trips/active/choice",
    tag = "Trips",
    summary = "Choose the next destination",
    description = "After `Exit Warehouse` the driver picks another warehouse or the factory. The choice is not stored.",
    params(("x-driver-id" = i64, Header, description = "Calling driver")),
    request_body = ChoiceRequest,
    responses(
        (status = 200, description = "Required checkpoint", body = ChoiceResponse),
        (status = 400, description = "Trip is not at a branch", body = ErrorResponse),
        (status = 404, description = "No trip in progress", body = ErrorResponse),
    )
)]
pub async fn choose_branch(
    State(state): State<AppState>,
    DriverIdentity(driver_id): DriverIdentity,
    Json(req): Json<ChoiceRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let (view, next) = state.trips.choose_branch(driver_id, req.choice).await?;
    Ok(Json(ChoiceResponse {
        trip_id: view.record.id(),
        next: NextActionDto::from(next),
    }))
}

/// `POST /trips/active/checkpoints` — Record a checkpoint.
///
/// The device's geolocation result goes through the same capture
/// pipeline as any other position source. If the client disconnects
/// before the write, the capture is cancelled and nothing is recorded.
///
/// # Errors
///
/// Returns a location error (422) when no usable fix was reported,
/// [`GatewayError::OutOfSequence`] for a checkpoint the workflow does not
/// admit, and [`GatewayError::CheckpointWriteFailure`] if the write failed.
#[utoipa::path(
    post,
    path = "/api/v1/trips/active/checkpoints",
    tag = "Trips",
    summary = "Record a checkpoint",
    description = "Records the next checkpoint with the device's position. The address is reverse-geocoded, falling back to the raw coordinates.",
    params(("x-driver-id" = i64, Header, description = "Calling driver")),
    request_body = CheckpointRequest,
    responses(
        (status = 201, description = "Checkpoint recorded", body = TripViewResponse),
        (status = 404, description = "No trip in progress", body = ErrorResponse),
        (status = 409, description = "Checkpoint not admitted now", body = ErrorResponse),
        (status = 422, description = "Location could not be captured", body = ErrorResponse),
        (status = 503, description = "Checkpoint could not be stored", body = ErrorResponse),
    )
)]
pub async fn record_checkpoint(
    State(state): State<AppState>,
    DriverIdentity(driver_id): DriverIdentity,
    Json(req): Json<CheckpointRequest>,
) -> Result<impl IntoResponse, GatewayError> {
    let source = req.reported_position(state.trips.capture().request())?;
    let cancel = CancellationToken::new();
    let _abandon_on_drop = cancel.clone().drop_guard();

    let view = state
        .trips
        .record_checkpoint(driver_id, req.kind, &source, &cancel)
        .await?;
    Ok((StatusCode::CREATED, Json(TripViewResponse::from(&view))))
}

/// Driver trip routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/trips", post(start_trip))
        .route("/trips/active", get(active_trip))
        .route("/trips/active/choice", post(choose_branch))
        .route("/trips/active/checkpoints", post(record_checkpoint))
}
