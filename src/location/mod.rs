//! Location capture: one position fix per checkpoint, plus a best-effort
//! address.
//!
//! - [`PositionSource`] — where fixes come from (the operator's device).
//! - [`ReverseGeocoder`] — coordinates to address; [`NominatimGeocoder`]
//!   talks to an OpenStreetMap Nominatim endpoint.
//! - [`LocationCapture`] — enforces the timeout, freshness, and
//!   cancellation rules and applies the coordinate fallback.

mod capture;
mod geocode;
mod position;
mod source;

pub use capture::LocationCapture;
pub use geocode::{
    DisabledGeocoder, GeocodeError, NominatimGeocoder, ReverseGeocoder, fallback_address,
};
pub use position::{LocationError, Position, PositionRequest};
pub use source::{PositionSource, ReportedPosition};
