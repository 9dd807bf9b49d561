use axum::extract::State;
use axum::http::StatusCode;
use axum::Extension;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::CookieJar;

use super::ApiError;
use super::ApiSuccess;
use super::MessageResponseData;
use super::REFRESH_TOKEN_COOKIE;
use super::REFRESH_TOKEN_COOKIE_PATH;
use crate::inbound::http::middleware::AuthenticatedPrincipal;
use crate::inbound::http::router::AppState;

/// Revoke the presented access token and drop the provider's refresh token.
pub async fn sign_out(
    State(state): State<AppState>,
    Extension(principal): Extension<AuthenticatedPrincipal>,
    jar: CookieJar,
) -> Result<(CookieJar, ApiSuccess<MessageResponseData>), ApiError> {
    state
        .authentication_service
        .sign_out(&principal.0)
        .await
        .map_err(|e| {
            tracing::warn!(user_id = %principal.0.user_id, error = %e, "Sign-out failed");
            ApiError::authentication_failed()
        })?;

    let jar = jar.remove(Cookie::build(REFRESH_TOKEN_COOKIE).path(REFRESH_TOKEN_COOKIE_PATH));

    Ok((
        jar,
        ApiSuccess::new(StatusCode::OK, MessageResponseData::new("Signed out")),
    ))
}
