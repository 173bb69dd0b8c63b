use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use tracing::warn;

use super::jwt::JwtKeys;
use crate::{error::AppError, policy::Principal, state::AppState};

/// Validates the bearer credential and resolves it to the current account.
///
/// The account is reloaded on every request: a deleted account is unauthenticated and
/// a role changed by an admin takes effect immediately, whatever the token says.
#[derive(Debug)]
pub struct AuthUser(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or(AppError::Unauthenticated)?;

        // Expect "Bearer <token>"
        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or(AppError::Unauthenticated)?;

        let claims = JwtKeys::from_ref(state).verify(token).map_err(|e| {
            warn!(error = %e, "invalid or expired token");
            AppError::Unauthenticated
        })?;

        let user = state
            .users
            .find_by_id(claims.sub)
            .await?
            .ok_or(AppError::Unauthenticated)?;

        if !user.confirmed {
            return Err(AppError::Unconfirmed);
        }

        Ok(AuthUser(Principal {
            id: user.id,
            role: user.role(),
        }))
    }
}
