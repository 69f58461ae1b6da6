//! REST API layer: route handlers, DTOs, and router composition.
//!
//! All endpoints are mounted under `/api/v1`. Driver endpoints identify
//! the caller by the `x-driver-id` header.

pub mod dto;
pub mod extract;
pub mod handlers;

use axum::Router;
use utoipa::OpenApi;

use crate::app_state::AppState;

/// Builds the complete API router with all REST endpoints.
pub fn build_router() -> Router<AppState> {
    Router::new()
        .nest("/api/v1", handlers::routes())
        .merge(handlers::system::routes())
}

/// OpenAPI document for every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "checkpoint-gateway",
        description = "Checkpoint workflow for factory-to-warehouse delivery trips."
    ),
    paths(
        handlers::system::health_handler,
        handlers::trips::start_trip,
        handlers::trips::active_trip,
        handlers::trips::choose_branch,
        handlers::trips::record_checkpoint,
        handlers::history::trip_history,
        handlers::admin::list_trips,
        handlers::admin::trip_detail,
        handlers::admin::edit_trip,
        handlers::admin::delete_trip,
        handlers::admin::driver_report,
    ),
    components(schemas(crate::error::ErrorResponse, crate::error::ErrorBody)),
    tags(
        (name = "Trips", description = "Driver trip workflow"),
        (name = "History", description = "Completed trip summaries"),
        (name = "Admin", description = "Trip correction and reporting"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/trips",
            "/api/v1/trips/active",
            "/api/v1/trips/active/choice",
            "/api/v1/trips/active/checkpoints",
            "/api/v1/trips/history",
            "/api/v1/admin/trips",
            "/api/v1/admin/trips/{id}",
            "/api/v1/admin/drivers/{id}/history",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
