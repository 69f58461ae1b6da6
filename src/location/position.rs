//! Position fixes, acquisition parameters, and classified capture failures.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::Coordinates;

/// A single device position fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Latitude/longitude of the fix.
    pub coordinates: Coordinates,
    /// Reported horizontal accuracy in metres.
    pub accuracy_m: Option<f64>,
    /// When the device took the fix.
    pub captured_at: DateTime<Utc>,
}

impl Position {
    /// Creates a fix taken now with unknown accuracy.
    #[must_use]
    pub fn now(coordinates: Coordinates) -> Self {
        Self {
            coordinates,
            accuracy_m: None,
            captured_at: Utc::now(),
        }
    }

    /// Age of the fix relative to `now`. Fixes stamped in the future
    /// have zero age.
    #[must_use]
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.captured_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }
}

/// Parameters for a single acquisition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRequest {
    /// Ask the device for its most accurate fix (GPS rather than cell/Wi-Fi).
    pub high_accuracy: bool,
    /// Upper bound on the wait for a fix.
    pub timeout: Duration,
    /// Oldest cached fix the device may hand back. Zero forces a fresh fix.
    pub maximum_age: Duration,
    /// Slack allowed on top of `maximum_age` for transport delay and clock
    /// drift between the device and this process.
    pub clock_skew_tolerance: Duration,
}

impl Default for PositionRequest {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
            clock_skew_tolerance: Duration::from_secs(15),
        }
    }
}

impl PositionRequest {
    /// Oldest fix this request accepts.
    #[must_use]
    pub fn freshness_limit(&self) -> Duration {
        self.maximum_age.saturating_add(self.clock_skew_tolerance)
    }
}

/// Why a position could not be captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LocationError {
    /// The user or OS denied location access.
    #[error("location permission denied")]
    PermissionDenied,
    /// No fix could be obtained (signal loss, invalid or stale fix).
    #[error("location unavailable")]
    Unavailable,
    /// No fix arrived within the bound.
    #[error("no position fix within {after:?}")]
    Timeout {
        /// The bound that was exceeded.
        after: Duration,
    },
    /// The acquisition was abandoned before it finished.
    #[error("location request cancelled")]
    Cancelled,
}

impl LocationError {
    /// Maps a W3C Geolocation API `PositionError.code` (1 = permission
    /// denied, 2 = position unavailable, 3 = timeout).
    ///
    /// Unknown codes are treated as unavailable.
    #[must_use]
    pub const fn from_geolocation_code(code: u16, bound: Duration) -> Self {
        match code {
            1 => Self::PermissionDenied,
            3 => Self::Timeout { after: bound },
            _ => Self::Unavailable,
        }
    }
}
