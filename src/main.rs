//! checkpoint-gateway server entry point.
//!
//! Starts the Axum HTTP server with the driver and admin REST endpoints.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::Router;
use sqlx::postgres::PgPoolOptions;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use checkpoint_gateway::api;
use checkpoint_gateway::app_state::AppState;
use checkpoint_gateway::config::GatewayConfig;
use checkpoint_gateway::location::{
    DisabledGeocoder, LocationCapture, NominatimGeocoder, ReverseGeocoder,
};
use checkpoint_gateway::persistence::{
    FleetDirectory, InMemoryFleetDirectory, InMemoryTripStore, PostgresFleetDirectory,
    PostgresTripStore,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load configuration
    let config = GatewayConfig::from_env().map_err(|e| anyhow::anyhow!("configuration: {e}"))?;
    tracing::info!(addr = %config.listen_addr, "starting checkpoint-gateway");

    // Location capture
    let geocoder: Arc<dyn ReverseGeocoder> = if config.geocoder_url.trim().is_empty() {
        tracing::warn!("reverse geocoding disabled; addresses fall back to coordinates");
        Arc::new(DisabledGeocoder)
    } else {
        Arc::new(
            NominatimGeocoder::new(
                config.geocoder_url.clone(),
                &config.geocoder_user_agent,
                config.geocoder_timeout(),
            )
            .context("building geocoder client")?,
        )
    };
    let capture = Arc::new(LocationCapture::new(
        geocoder,
        config.position_request(),
        config.geocoder_timeout(),
    ));

    // Persistence and application state
    let app_state = if config.persistence_enabled {
        let pool = PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connect_timeout_secs))
            .connect(&config.database_url)
            .await
            .context("connecting to PostgreSQL")?;
        let store = Arc::new(PostgresTripStore::new(pool.clone()));
        store.migrate().await.context("running migrations")?;
        let fleet: Arc<dyn FleetDirectory> = Arc::new(PostgresFleetDirectory::new(pool));
        tracing::info!("using PostgreSQL trip store");
        AppState::new(store, fleet, capture, config.business_offset())
    } else {
        let fleet = match &config.fleet_directory_path {
            Some(path) => InMemoryFleetDirectory::from_json_file(path)
                .with_context(|| format!("loading fleet directory {}", path.display()))?,
            None => InMemoryFleetDirectory::default(),
        };
        if fleet.is_empty() {
            tracing::warn!("fleet directory is empty; every driver request will be rejected");
        }
        tracing::info!(drivers = fleet.len(), "using in-memory trip store");
        let fleet: Arc<dyn FleetDirectory> = Arc::new(fleet);
        AppState::new(
            Arc::new(InMemoryTripStore::new()),
            fleet,
            capture,
            config.business_offset(),
        )
    };

    // Build router
    let app = Router::new().merge(api::build_router());

    #[cfg(feature = "swagger-ui")]
    let app = {
        use utoipa::OpenApi;
        app.merge(
            utoipa_swagger_ui::SwaggerUi::new("/swagger-ui")
                .url("/api-docs/openapi.json", api::ApiDoc::openapi()),
        )
    };

    let app = app
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr).await?;
    tracing::info!(addr = %config.listen_addr, "server listening");

    axum::serve(listener, app).await?;

    Ok(())
}
