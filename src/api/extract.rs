//! Request extractors.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use crate::domain::DriverId;
use crate::error::GatewayError;

/// Header carrying the authenticated driver's id, set by the upstream
/// authentication layer.
pub const DRIVER_ID_HEADER: &str = "x-driver-id";

/// The driver making the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DriverIdentity(pub DriverId);

impl<S> FromRequestParts<S> for DriverIdentity
where
    S: Send + Sync,
{
    type Rejection = GatewayError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(DRIVER_ID_HEADER)
            .ok_or_else(|| {
                GatewayError::InvalidRequest(format!("missing {DRIVER_ID_HEADER} header"))
            })?
            .to_str()
            .map_err(|_| {
                GatewayError::InvalidRequest(format!("{DRIVER_ID_HEADER} must be ASCII"))
            })?;
        let id = raw.trim().parse::<i64>().map_err(|_| {
            GatewayError::InvalidRequest(format!("{DRIVER_ID_HEADER} must be an integer"))
        })?;
        Ok(Self(DriverId::new(id)))
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use axum::http::Request;

    use super::*;

    async fn extract(header: Option<&str>) -> Result<DriverIdentity, GatewayError> {
        let mut builder = Request::builder().uri("/");
        if let Some(value) = header {
            builder = builder.header(DRIVER_ID_HEADER, value);
        }
        let Ok(request) = builder.body(()) else {
            panic!("valid request");
        };
        let (mut parts, ()) = request.into_parts();
        DriverIdentity::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn reads_driver_id() {
        let Ok(DriverIdentity(id)) = extract(Some(" 7 ")).await else {
            panic!("header should parse");
        };
        assert_eq!(id, DriverId::new(7));
    }

    #[tokio::test]
    async fn missing_or_malformed_header_is_bad_request() {
        assert!(matches!(
            extract(None).await,
            Err(GatewayError::InvalidRequest(_))
        ));
        assert!(matches!(
            extract(Some("driver-7")).await,
            Err(GatewayError::InvalidRequest(_))
        ));
    }
}
