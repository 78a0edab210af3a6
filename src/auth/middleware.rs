//! Request authentication middleware.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use super::authenticator::Authenticator;
use crate::error::ApiError;

/// Header carrying the client's identity token.
pub const AUTH_TOKEN_HEADER: &str = "auth-token";

/// Rejects requests without a valid token (401) or from blacklisted users
/// (403); otherwise makes the caller's [`Identity`](super::Identity)
/// available as a request extension.
pub async fn require_auth(
    State(auth): State<Authenticator>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|token| !token.is_empty())
        .map(str::to_owned)
        .ok_or(ApiError::Unauthorized)?;

    let identity = auth.authenticate(&token).await?;
    if auth.is_blacklisted(&identity.email).await? {
        return Err(ApiError::Forbidden);
    }

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}
