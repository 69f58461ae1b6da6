//! Where position fixes come from.

use std::fmt;

use async_trait::async_trait;

use super::{LocationError, Position, PositionRequest};

/// A device capable of producing one position fix on demand.
///
/// Implementations must honour the request parameters as far as the
/// underlying hardware allows; [`super::LocationCapture`] enforces the
/// timeout and freshness bounds regardless.
#[async_trait]
pub trait PositionSource: Send + Sync + fmt::Debug {
    /// Produces a single fix, or a classified failure.
    async fn current_position(&self, request: &PositionRequest)
    -> Result<Position, LocationError>;
}

/// The outcome of a geolocation call already made on the operator's
/// device and submitted with the checkpoint request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReportedPosition {
    /// The device obtained a fix.
    Fix(Position),
    /// The device reported a failure.
    Failed(LocationError),
}

#[async_trait]
impl PositionSource for ReportedPosition {
    async fn current_position(
        &self,
        _request: &PositionRequest,
    ) -> Result<Position, LocationError> {
        match self {
            Self::Fix(position) => Ok(*position),
            Self::Failed(err) => Err(*err),
        }
    }
}
