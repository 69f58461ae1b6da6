//! Admin trip handlers: list, detail, edit, delete, per-driver report.
//!
//! Access control is enforced upstream of this service.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{
    AdminTripListQuery, AdminTripListResponse, EditTripRequest, MonthQuery,
    MonthlyHistoryResponse, TripDetailResponse, TripSummaryDto, TripViewResponse,
};
use crate::app_state::AppState;
use crate::domain::{DriverId, MonthPeriod, TripId};
use crate::error::{ErrorResponse, GatewayError};

/// `GET /admin/trips` — List trips.
///
/// # Errors
///
/// Returns [`GatewayError`] on storage failures.
#[utoipa::path(
    get,
    path = "/api/v1/admin/trips",
    tag = "Admin",
    summary = "List trips",
    description = "All trips, optionally for one driver, newest first, each with its summary and last recorded state.",
    params(AdminTripListQuery),
    responses(
        (status = 200, description = "Trip list", body = AdminTripListResponse),
    )
)]
pub async fn list_trips(
    State(state): State<AppState>,
    Query(query): Query<AdminTripListQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let summaries = state.admin.list_trips(query.driver_id).await?;
    let data: Vec<TripSummaryDto> = summaries.iter().map(TripSummaryDto::from).collect();
    Ok(Json(AdminTripListResponse {
        total: data.len(),
        data,
    }))
}

/// `GET /admin/trips/{id}` — Trip detail.
///
/// # Errors
///
/// Returns [`GatewayError::TripNotFound`] for an unknown trip.
#[utoipa::path(
    get,
    path = "/api/v1/admin/trips/{id}",
    tag = "Admin",
    summary = "Get trip detail",
    description = "Full checkpoint timeline with coordinates and map links.",
    params(("id" = i64, Path, description = "Trip id")),
    responses(
        (status = 200, description = "Trip detail", body = TripDetailResponse),
        (status = 404, description = "Trip not found", body = ErrorResponse),
    )
)]
pub async fn trip_detail(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> Result<impl IntoResponse, GatewayError> {
    let detail = state.admin.trip_detail(trip_id).await?;
    Ok(Json(TripDetailResponse::from(&detail)))
}

/// `PATCH /admin/trips/{id}` — Correct a trip.
///
/// # Errors
///
/// Returns [`GatewayError::EditRejected`] if the edit would break
/// checkpoint order or status rules; nothing is written in that case.
#[utoipa::path(
    patch,
    path = "/api/v1/admin/trips/{id}",
    tag = "Admin",
    summary = "Edit a trip",
    description = "Reassigns the driver, overrides status or start date, and rewrites per-log timestamps and addresses. Checkpoint kinds are immutable.",
    params(("id" = i64, Path, description = "Trip id")),
    request_body = EditTripRequest,
    responses(
        (status = 200, description = "Trip after the edit", body = TripViewResponse),
        (status = 400, description = "Empty edit or fields that cannot be edited", body = ErrorResponse),
        (status = 404, description = "Trip, log or driver not found", body = ErrorResponse),
        (status = 409, description = "Target driver already has a trip in progress", body = ErrorResponse),
        (status = 422, description = "Edit would break the trip's invariants", body = ErrorResponse),
    )
)]
pub async fn edit_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
    payload: Result<Json<EditTripRequest>, JsonRejection>,
) -> Result<impl IntoResponse, GatewayError> {
    let Json(req) = payload.map_err(|rejection| {
        GatewayError::InvalidRequest(format!("invalid edit: {}", rejection.body_text()))
    })?;
    let record = state.admin.edit_trip(trip_id, req.into()).await?;
    Ok(Json(TripViewResponse::from(&record)))
}

/// `DELETE /admin/trips/{id}` — Delete a trip with all its checkpoints.
///
/// # Errors
///
/// Returns [`GatewayError::TripNotFound`] for an unknown trip.
#[utoipa::path(
    delete,
    path = "/api/v1/admin/trips/{id}",
    tag = "Admin",
    summary = "Delete a trip",
    params(("id" = i64, Path, description = "Trip id")),
    responses(
        (status = 204, description = "Trip deleted"),
        (status = 404, description = "Trip not found", body = ErrorResponse),
    )
)]
pub async fn delete_trip(
    State(state): State<AppState>,
    Path(trip_id): Path<TripId>,
) -> Result<impl IntoResponse, GatewayError> {
    state.admin.delete_trip(trip_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /admin/drivers/{id}/history` — A driver's trips by month.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a month outside 1-12.
#[utoipa::path(
    get,
    path = "/api/v1/admin/drivers/{id}/history",
    tag = "Admin",
    summary = "Driver monthly report",
    description = "All of a driver's trips, including ones in progress, grouped by month, newest first. With `month` or `year`, only that month is returned.",
    params(
        ("id" = i64, Path, description = "Driver id"),
        MonthQuery,
    ),
    responses(
        (status = 200, description = "Monthly report", body = Vec<MonthlyHistoryResponse>),
        (status = 400, description = "Invalid month or year", body = ErrorResponse),
    )
)]
pub async fn driver_report(
    State(state): State<AppState>,
    Path(driver_id): Path<DriverId>,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let period = if query.is_unset() {
        None
    } else {
        Some(MonthPeriod::from_filters(
            query.month,
            query.year,
            state.business_offset,
        )?)
    };
    let months = state.admin.monthly_report(driver_id, period).await?;
    let body: Vec<MonthlyHistoryResponse> =
        months.iter().map(MonthlyHistoryResponse::from).collect();
    Ok(Json(body))
}

/// Admin routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/admin/trips", get(list_trips))
        .route(
            "/admin/trips/{id}",
            get(trip_detail).patch(edit_trip).delete(delete_trip),
        )
        .route("/admin/drivers/{id}/history", get(driver_report))
}
