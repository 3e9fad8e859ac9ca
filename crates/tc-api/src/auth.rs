//! Bearer-token extractor for protected routes.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tc_core::{AppError, Identity};
use tracing::debug;

use crate::response::ApiError;
use crate::AppState;

/// The verified caller of a protected route.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity: Identity,
    /// Raw bearer token, kept for logout.
    pub token: String,
}

fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| AppError::Unauthorized("missing bearer token".into()))?
            .to_string();

        let identity = state.accounts.authenticate(&token).await?;
        debug!(uid = %identity.uid, path = %parts.uri.path(), "Authenticated request");
        Ok(AuthUser { identity, token })
    }
}
