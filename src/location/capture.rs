//! The position-then-address pipeline run for every checkpoint.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::geocode::{ReverseGeocoder, fallback_address};
use super::{LocationError, Position, PositionRequest, PositionSource};

/// Acquires a fix and resolves it to an address.
///
/// Acquisition is mandatory and fails with a classified [`LocationError`].
/// Address resolution is advisory: it always yields a string, falling back
/// to the raw coordinates when the geocoder fails or is slow.
#[derive(Debug)]
pub struct LocationCapture {
    geocoder: Arc<dyn ReverseGeocoder>,
    request: PositionRequest,
    geocode_timeout: Duration,
}

impl LocationCapture {
    /// Creates a capture pipeline.
    #[must_use]
    pub fn new(
        geocoder: Arc<dyn ReverseGeocoder>,
        request: PositionRequest,
        geocode_timeout: Duration,
    ) -> Self {
        Self {
            geocoder,
            request,
            geocode_timeout,
        }
    }

    /// Acquisition parameters in effect.
    #[must_use]
    pub const fn request(&self) -> &PositionRequest {
        &self.request
    }

    /// Acquires a single fresh fix from `source`.
    ///
    /// Cancelling `cancel` abandons the wait immediately.
    ///
    /// # Errors
    ///
    /// - [`LocationError::Cancelled`] if `cancel` fires first.
    /// - [`LocationError::Timeout`] if no fix arrives within the bound.
    /// - [`LocationError::Unavailable`] for invalid coordinates or a fix
    ///   older than the freshness limit.
    /// - Any failure reported by the source.
    pub async fn acquire(
        &self,
        source: &dyn PositionSource,
        cancel: &CancellationToken,
    ) -> Result<Position, LocationError> {
        let bound = self.request.timeout;
        let outcome = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(LocationError::Cancelled),
            result = tokio::time::timeout(bound, source.current_position(&self.request)) => {
                result.unwrap_or(Err(LocationError::Timeout { after: bound }))
            }
        };
        let position = outcome?;
        self.check_fix(&position)?;
        debug!(
            position = %position.coordinates,
            accuracy_m = ?position.accuracy_m,
            "position acquired"
        );
        Ok(position)
    }

    fn check_fix(&self, position: &Position) -> Result<(), LocationError> {
        if !position.coordinates.is_valid() {
            warn!(position = ?position.coordinates, "rejecting out-of-range fix");
            return Err(LocationError::Unavailable);
        }
        let age = position.age_at(Utc::now());
        if age > self.request.freshness_limit() {
            warn!(age_ms = age.as_millis() as u64, "rejecting stale fix");
            return Err(LocationError::Unavailable);
        }
        Ok(())
    }

    /// Resolves `position` to an address, never failing.
    pub async fn resolve_address(&self, position: &Position) -> String {
        let coordinates = position.coordinates;
        match tokio::time::timeout(self.geocode_timeout, self.geocoder.resolve(coordinates)).await
        {
            Ok(Ok(address)) => address,
            Ok(Err(err)) => {
                warn!(error = %err, position = %coordinates, "geocoding failed, recording coordinates");
                fallback_address(coordinates)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.geocode_timeout.as_millis() as u64,
                    position = %coordinates,
                    "geocoding timed out, recording coordinates"
                );
                fallback_address(coordinates)
            }
        }
    }
}
