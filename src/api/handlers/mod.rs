//! REST endpoint handlers organized by resource.

pub mod admin;
pub mod history;
pub mod system;
pub mod trips;

use axum::Router;

use crate::app_state::AppState;

/// Composes all resource routes under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .merge(trips::routes())
        .merge(history::routes())
        .merge(admin::routes())
}
