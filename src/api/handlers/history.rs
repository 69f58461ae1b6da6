//! Driver trip history.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};

use crate::api::dto::{MonthQuery, MonthlyHistoryResponse};
use crate::api::extract::DriverIdentity;
use crate::app_state::AppState;
use crate::error::{ErrorResponse, GatewayError};

/// `GET /trips/history` — Completed trips for one month.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] for a month outside 1-12.
#[utoipa::path(
    get,
    path = "/api/v1/trips/history",
    tag = "History",
    summary = "Monthly trip history",
    description = "The calling driver's completed trips started in the given month, newest first, with duration, warehouse count and route. Defaults to the current month on the business clock.",
    params(
        ("x-driver-id" = i64, Header, description = "Calling driver"),
        MonthQuery,
    ),
    responses(
        (status = 200, description = "Monthly history", body = MonthlyHistoryResponse),
        (status = 400, description = "Invalid month or year", body = ErrorResponse),
    )
)]
pub async fn trip_history(
    State(state): State<AppState>,
    DriverIdentity(driver_id): DriverIdentity,
    Query(query): Query<MonthQuery>,
) -> Result<impl IntoResponse, GatewayError> {
    let history = state
        .history
        .history_for(driver_id, query.month, query.year)
        .await?;
    Ok(Json(MonthlyHistoryResponse::from(&history)))
}

/// History routes.
pub fn routes() -> Router<AppState> {
    Router::new().route("/trips/history", get(trip_history))
}
