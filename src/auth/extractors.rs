use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};

use super::repo::User;
use crate::error::ApiError;
use crate::state::AppState;

/// Resolves the authenticated user from the bearer token. Every protected
/// handler takes this extractor first; the loaded row supplies both
/// attribution (id + display name) and authorization scoping.
pub struct AuthUser(pub User);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".into()))?;

        let token = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::Unauthorized("Invalid auth scheme".into()))?;

        let claims = state
            .jwt
            .verify(token)
            .map_err(|_| ApiError::Unauthorized("Could not validate token".into()))?;

        let user_id: i32 = claims
            .id
            .parse()
            .map_err(|_| ApiError::Unauthorized("User ID not found in token".into()))?;

        // The subject may no longer resolve (e.g. a stale token after a
        // manual row deletion); that is a missing user, not a bad token.
        let user = User::find_by_id(&state.db, user_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

        Ok(AuthUser(user))
    }
}
