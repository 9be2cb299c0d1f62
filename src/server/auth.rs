//! Service key check for every route except `/health`.

use crate::{error::GatewayError, Result};
use axum::http::{header, HeaderMap};

/// Require `Authorization: Bearer <service key>`.
pub fn authorize(headers: &HeaderMap, service_api_key: &str) -> Result<()> {
    let presented = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim);

    match presented {
        Some(key) if !key.is_empty() && key == service_api_key => Ok(()),
        _ => Err(GatewayError::Unauthorized),
    }
}
