//! Reverse geocoding: coordinates to a human-readable address.
//!
//! Lookups are advisory. A failure here never blocks a checkpoint; the
//! caller substitutes [`fallback_address`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::domain::Coordinates;

/// Why an address lookup produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeocodeError {
    /// The lookup did not finish in time.
    #[error("geocoder timed out")]
    Timeout,
    /// Connection or protocol failure.
    #[error("geocoder request failed: {0}")]
    Transport(String),
    /// The service answered with a non-success status.
    #[error("geocoder returned HTTP {0}")]
    Status(u16),
    /// The response body could not be decoded.
    #[error("geocoder response could not be decoded: {0}")]
    Decode(String),
    /// The service found no address for the coordinates.
    #[error("no address for coordinates")]
    NoAddress,
    /// Address lookup is switched off.
    #[error("geocoding disabled")]
    Disabled,
    /// The HTTP client could not be built.
    #[error("geocoder client: {0}")]
    Client(String),
}

/// A reverse-geocoding service.
#[async_trait]
pub trait ReverseGeocoder: Send + Sync + fmt::Debug {
    /// Resolves coordinates to an address.
    async fn resolve(&self, coordinates: Coordinates) -> Result<String, GeocodeError>;
}

/// The address recorded when lookup fails: the raw coordinates.
#[must_use]
pub fn fallback_address(coordinates: Coordinates) -> String {
    format!(
        "Lat: {}, Lon: {}",
        coordinates.latitude, coordinates.longitude
    )
}

#[derive(Debug, Deserialize)]
struct ReverseResponse {
    display_name: Option<String>,
}

/// Client for a Nominatim-compatible `/reverse` endpoint.
#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    client: reqwest::Client,
    endpoint: String,
}

impl NominatimGeocoder {
    /// Creates a client for `endpoint` (e.g.
    /// `https://nominatim.openstreetmap.org/reverse`).
    ///
    /// # Errors
    ///
    /// Returns [`GeocodeError::Client`] if the HTTP client cannot be built.
    pub fn new(
        endpoint: impl Into<String>,
        user_agent: &str,
        timeout: Duration,
    ) -> Result<Self, GeocodeError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| GeocodeError::Client(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    fn request_url(&self, coordinates: Coordinates) -> String {
        let separator = if self.endpoint.contains('?') { '&' } else { '?' };
        format!(
            "{}{separator}format=json&lat={}&lon={}",
            self.endpoint, coordinates.latitude, coordinates.longitude
        )
    }
}

#[async_trait]
impl ReverseGeocoder for NominatimGeocoder {
    async fn resolve(&self, coordinates: Coordinates) -> Result<String, GeocodeError> {
        let url = self.request_url(coordinates);
        debug!(url = %url, "reverse geocoding");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                GeocodeError::Timeout
            } else {
                GeocodeError::Transport(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "geocoder returned error status");
            return Err(GeocodeError::Status(status.as_u16()));
        }

        let body: ReverseResponse = response
            .json()
            .await
            .map_err(|e| GeocodeError::Decode(e.to_string()))?;
        parse_display_name(body)
    }
}

fn parse_display_name(body: ReverseResponse) -> Result<String, GeocodeError> {
    body.display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .ok_or(GeocodeError::NoAddress)
}

/// Geocoder used when no endpoint is configured. Every lookup falls back
/// to coordinates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledGeocoder;

#[async_trait]
impl ReverseGeocoder for DisabledGeocoder {
    async fn resolve(&self, _coordinates: Coordinates) -> Result<String, GeocodeError> {
        Err(GeocodeError::Disabled)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;

    fn geocoder(endpoint: &str) -> NominatimGeocoder {
        let Ok(geocoder) = NominatimGeocoder::new(endpoint, "test-agent", Duration::from_secs(1))
        else {
            panic!("client should build");
        };
        geocoder
    }

    #[test]
    fn fallback_contains_raw_coordinates() {
        let address = fallback_address(Coordinates::new(24.7136, 46.6753));
        assert_eq!(address, "Lat: 24.7136, Lon: 46.6753");
    }

    #[test]
    fn request_url_carries_format_and_coordinates() {
        let url = geocoder("https://nominatim.openstreetmap.org/reverse")
            .request_url(Coordinates::new(24.5, 46.25));
        assert_eq!(
            url,
            "https://nominatim.openstreetmap.org/reverse?format=json&lat=24.5&lon=46.25"
        );
    }

    #[test]
    fn request_url_appends_to_existing_query() {
        let url = geocoder("http://geo.local/reverse?zoom=18").request_url(Coordinates::new(1.0, 2.0));
        assert_eq!(url, "http://geo.local/reverse?zoom=18&format=json&lat=1&lon=2");
    }

    #[test]
    fn display_name_is_extracted() {
        let Ok(body) =
            serde_json::from_str::<ReverseResponse>(r#"{"display_name":"King Fahd Rd, Riyadh","lat":"24.7"}"#)
        else {
            panic!("valid body");
        };
        assert_eq!(parse_display_name(body), Ok("King Fahd Rd, Riyadh".to_string()));
    }

    #[test]
    fn missing_or_blank_display_name_is_no_address() {
        let Ok(missing) = serde_json::from_str::<ReverseResponse>(r#"{"error":"Unable to geocode"}"#)
        else {
            panic!("valid body");
        };
        assert_eq!(parse_display_name(missing), Err(GeocodeError::NoAddress));
        let blank = ReverseResponse {
            display_name: Some("  ".to_string()),
        };
        assert_eq!(parse_display_name(blank), Err(GeocodeError::NoAddress));
    }

    #[tokio::test]
    async fn disabled_geocoder_always_fails() {
        let result = DisabledGeocoder.resolve(Coordinates::new(0.0, 0.0)).await;
        assert_eq!(result, Err(GeocodeError::Disabled));
    }
}
