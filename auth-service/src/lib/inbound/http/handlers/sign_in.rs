use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::cookie::Cookie;
use axum_extra::extract::cookie::SameSite;
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::AccessTokenResponseData;
use super::ApiError;
use super::ApiSuccess;
use super::REFRESH_TOKEN_COOKIE;
use super::REFRESH_TOKEN_COOKIE_PATH;
use crate::authentication::models::EmailAddress;
use crate::authentication::strategy::LocalCredentials;
use crate::inbound::http::router::AppState;

/// Local sign-in: the strategy checks the password, the orchestrator opens the session.
///
/// The refresh token only travels in an HttpOnly cookie scoped to the auth routes.
pub async fn sign_in(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(body): Json<SignInRequest>,
) -> Result<(CookieJar, ApiSuccess<AccessTokenResponseData>), ApiError> {
    let email = EmailAddress::new(body.email)
        .map_err(|e| ApiError::UnprocessableEntity(format!("Invalid email: {}", e)))?;

    let account = state
        .local_strategy
        .authenticate(LocalCredentials {
            email,
            password: body.password,
        })
        .await?;
    let session = state.authentication_service.local_sign_in(account).await?;

    let jar = jar.add(refresh_token_cookie(session.refresh_token, state.secure_cookies));

    Ok((
        jar,
        ApiSuccess::new(
            StatusCode::OK,
            AccessTokenResponseData {
                access_token: session.access_token,
            },
        ),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SignInRequest {
    email: String,
    password: String,
}

pub(crate) fn refresh_token_cookie(token: String, secure: bool) -> Cookie<'static> {
    Cookie::build((REFRESH_TOKEN_COOKIE, token))
        .path(REFRESH_TOKEN_COOKIE_PATH)
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build()
}
