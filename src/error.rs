//! Gateway error types with HTTP status code mapping.
//!
//! [`GatewayError`] is the central error type. Each variant maps to a
//! numeric error code, an HTTP status code, and (for errors the operator
//! can fix) a remediation hint rendered in the `details` field.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::domain::{CheckpointKind, DriverId, GrammarViolation, LogId, NextAction, TripId};
use crate::location::LocationError;

/// Structured JSON error response body.
///
/// All error responses follow this shape:
/// ```json
/// {
///   "error": {
///     "code": 4001,
///     "message": "location permission denied",
///     "details": "Enable location access for this app in the device settings, then retry."
///   }
/// }
/// ```
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Structured error payload.
    pub error: ErrorBody,
}

/// Inner error body with numeric code and human-readable message.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    /// Numeric error code.
    pub code: u32,
    /// Human-readable error message.
    pub message: String,
    /// Remediation hint or additional context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Server-side error enum with HTTP status code mapping.
///
/// Reverse-geocoding failures never appear here: they are absorbed by
/// [`crate::location::LocationCapture::resolve_address`], which substitutes
/// a coordinate string.
///
/// # Error Code Ranges
///
/// | Range     | Category                 | HTTP Status                    |
/// |-----------|--------------------------|--------------------------------|
/// | 1000–1999 | Validation               | 400 / 422                      |
/// | 2000–2999 | State / Not Found        | 404 Not Found / 409 Conflict   |
/// | 3000–3999 | Server / data integrity  | 500 / 503                      |
/// | 4000–4999 | Location capture         | 422 Unprocessable Entity       |
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The device or user denied access to location.
    #[error("location permission denied")]
    LocationPermissionDenied,

    /// No position fix could be obtained.
    #[error("location unavailable")]
    LocationUnavailable,

    /// Acquiring a position exceeded the configured bound.
    #[error("location request timed out after {after_secs} s")]
    LocationTimeout {
        /// Configured bound in seconds.
        after_secs: u64,
    },

    /// Position capture was cancelled before a checkpoint was written.
    #[error("location request cancelled")]
    LocationCancelled,

    /// The checkpoint could not be persisted. Nothing was recorded.
    #[error("failed to record {kind}: {reason}")]
    CheckpointWriteFailure {
        /// Checkpoint that was being recorded.
        kind: CheckpointKind,
        /// Underlying storage failure.
        reason: String,
    },

    /// The driver already has a trip in progress.
    #[error("driver already has trip {trip_id} in progress")]
    ActiveTripConflict {
        /// The in-progress trip to resume instead.
        trip_id: TripId,
    },

    /// A stored checkpoint history violates the grammar.
    #[error("trip {trip_id} has a corrupted checkpoint history: {violation}")]
    GrammarViolation {
        /// Trip whose history is corrupted.
        trip_id: TripId,
        /// Where the history breaks.
        violation: GrammarViolation,
    },

    /// The checkpoint is not a legal next step for the trip.
    #[error("{got} cannot be recorded now; expected {expected}")]
    OutOfSequence {
        /// What the history currently requires.
        expected: NextAction,
        /// What was submitted.
        got: CheckpointKind,
    },

    /// The trip is already completed.
    #[error("trip {0} is already completed")]
    TripCompleted(TripId),

    /// The driver has no trip in progress.
    #[error("no active trip found")]
    NoActiveTrip,

    /// Trip with the given ID was not found.
    #[error("trip not found: {0}")]
    TripNotFound(TripId),

    /// Checkpoint log with the given ID was not found on the trip.
    #[error("checkpoint log not found: {0}")]
    LogNotFound(LogId),

    /// Driver with the given ID is unknown to the fleet directory.
    #[error("driver not found: {0}")]
    DriverNotFound(DriverId),

    /// Request validation failed.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// An administrative edit was rejected because it would break the
    /// trip's invariants.
    #[error("edit rejected: {0}")]
    EditRejected(String),

    /// Persistence layer failure.
    #[error("persistence error: {0}")]
    PersistenceError(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl GatewayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::InvalidRequest(_) => 1001,
            Self::EditRejected(_) => 1002,
            Self::TripNotFound(_) => 2001,
            Self::LogNotFound(_) => 2002,
            Self::DriverNotFound(_) => 2003,
            Self::NoActiveTrip => 2004,
            Self::ActiveTripConflict { .. } => 2101,
            Self::OutOfSequence { .. } => 2102,
            Self::TripCompleted(_) => 2103,
            Self::Internal(_) => 3000,
            Self::PersistenceError(_) => 3001,
            Self::GrammarViolation { .. } => 3002,
            Self::CheckpointWriteFailure { .. } => 3003,
            Self::LocationPermissionDenied => 4001,
            Self::LocationUnavailable => 4002,
            Self::LocationTimeout { .. } => 4003,
            Self::LocationCancelled => 4004,
        }
    }

    /// Returns the HTTP status code for this variant.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            Self::EditRejected(_)
            | Self::LocationPermissionDenied
            | Self::LocationUnavailable
            | Self::LocationTimeout { .. }
            | Self::LocationCancelled => StatusCode::UNPROCESSABLE_ENTITY,
            Self::TripNotFound(_)
            | Self::LogNotFound(_)
            | Self::DriverNotFound(_)
            | Self::NoActiveTrip => StatusCode::NOT_FOUND,
            Self::ActiveTripConflict { .. }
            | Self::OutOfSequence { .. }
            | Self::TripCompleted(_) => StatusCode::CONFLICT,
            Self::CheckpointWriteFailure { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::GrammarViolation { .. } | Self::PersistenceError(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Operator-facing remediation, for errors with a local fix.
    #[must_use]
    pub fn remediation(&self) -> Option<String> {
        match self {
            Self::LocationPermissionDenied => Some(
                "Enable location access for this app in the device settings, then retry."
                    .to_string(),
            ),
            Self::LocationUnavailable => {
                Some("Location unavailable. Check GPS signal and retry.".to_string())
            }
            Self::LocationTimeout { .. } => Some(
                "No GPS fix in time. Make sure GPS is switched on, move to open sky, and retry."
                    .to_string(),
            ),
            Self::CheckpointWriteFailure { kind, .. } => Some(format!(
                "Nothing was recorded. Check your connection and log {kind} again."
            )),
            Self::ActiveTripConflict { trip_id } => {
                Some(format!("Resume trip {trip_id} instead of starting a new one."))
            }
            Self::OutOfSequence { .. } => {
                Some("The trip was updated elsewhere. Reload it to see the next step.".to_string())
            }
            _ => None,
        }
    }

    /// Returns `true` for failures that leave the workflow where it was
    /// and can be retried as-is.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::LocationPermissionDenied
                | Self::LocationUnavailable
                | Self::LocationTimeout { .. }
                | Self::LocationCancelled
                | Self::CheckpointWriteFailure { .. }
        )
    }
}

impl From<LocationError> for GatewayError {
    fn from(err: LocationError) -> Self {
        match err {
            LocationError::PermissionDenied => Self::LocationPermissionDenied,
            LocationError::Unavailable => Self::LocationUnavailable,
            LocationError::Timeout { after } => Self::LocationTimeout {
                after_secs: after.as_secs(),
            },
            LocationError::Cancelled => Self::LocationCancelled,
        }
    }
}

impl From<sqlx::Error> for GatewayError {
    fn from(err: sqlx::Error) -> Self {
        Self::PersistenceError(err.to_string())
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        let body = ErrorResponse {
            error: ErrorBody {
                code: self.error_code(),
                message: self.to_string(),
                details: self.remediation(),
            },
        };
        let mut response = axum::Json(body).into_response();
        *response.status_mut() = status;
        response
    }
}
