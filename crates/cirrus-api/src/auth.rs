//! Request identity extraction.
//!
//! Ownership checks downstream rely on the caller identity from the
//! `x-user-id` header, populated by the auth gateway in front of this
//! service. A missing or malformed identity is rejected before any handler
//! logic runs.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use cirrus_core::AppError;
use uuid::Uuid;

use crate::error::HttpAppError;

pub const USER_ID_HEADER: &str = "x-user-id";

/// Authenticated caller identity.
#[derive(Debug, Clone, Copy)]
pub struct UserId(pub Uuid);

impl<S> FromRequestParts<S> for UserId
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                HttpAppError(AppError::Forbidden("Missing x-user-id header".to_string()))
            })?;

        let id = value.parse::<Uuid>().map_err(|_| {
            HttpAppError(AppError::Forbidden("Invalid x-user-id header".to_string()))
        })?;
        if id.is_nil() {
            return Err(HttpAppError(AppError::Forbidden(
                "Invalid x-user-id header".to_string(),
            )));
        }
        Ok(UserId(id))
    }
}
