use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};

use crate::auth::{API_KEY_HEADER, Principal};
use crate::error::AppError;
use crate::state::AppState;

/// Caller authenticated by the `X-API-Key` header.
///
/// Add this as a handler parameter to require a valid key. It runs before
/// the request body is read, so a rejected caller never has bytes staged.
/// Behind [`require_api_key`] the principal resolved there is reused.
pub struct ApiKeyAuth(pub Principal);

impl FromRequestParts<AppState> for ApiKeyAuth {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        if let Some(principal) = parts.extensions.get::<Principal>() {
            return Ok(ApiKeyAuth(principal.clone()));
        }

        // A header that is not valid visible ASCII can never match an issued key.
        let header = match parts.headers.get(API_KEY_HEADER) {
            None => None,
            Some(value) => Some(value.to_str().map_err(|_| AppError::UnknownCredential)?),
        };

        let principal = state.authenticator.authenticate(header).await?;
        Ok(ApiKeyAuth(principal))
    }
}

/// Middleware rejecting requests without a valid API key.
///
/// Layered outside the per-route quotas so that rejected callers never
/// consume them.
pub async fn require_api_key(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let (mut parts, body) = req.into_parts();
    let ApiKeyAuth(principal) = ApiKeyAuth::from_request_parts(&mut parts, &state).await?;
    parts.extensions.insert(principal);
    Ok(next.run(Request::from_parts(parts, body)).await)
}
