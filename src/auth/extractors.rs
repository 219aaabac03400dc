use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;
use uuid::Uuid;

use super::session::SessionKeys;
use crate::error::AppError;

/// Extracts and verifies the bearer session token, yielding the user ID.
pub struct SessionUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for SessionUser
where
    S: Send + Sync,
    SessionKeys: FromRef<S>,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthorized("missing Authorization header"))?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AppError::Unauthorized("invalid auth scheme"))?;

        let claims = SessionKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired session token");
            AppError::Unauthorized("invalid or expired token")
        })?;

        Ok(SessionUser(claims.sub))
    }
}
