use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::CookieJar;
use serde::Deserialize;

use super::AccessTokenResponseData;
use super::ApiError;
use super::ApiSuccess;
use super::REFRESH_TOKEN_COOKIE;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    refresh_token: Option<String>,
}

/// Mint a new access token from the refresh token cookie, or from the body
/// for clients that cannot hold cookies.
///
/// Every failure answers with the same 401 body.
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<Json<RefreshRequest>>,
) -> Result<ApiSuccess<AccessTokenResponseData>, ApiError> {
    let token = jar
        .get(REFRESH_TOKEN_COOKIE)
        .map(|cookie| cookie.value().to_string())
        .or_else(|| body.and_then(|Json(body)| body.refresh_token))
        .ok_or_else(ApiError::authentication_failed)?;

    let access_token = state
        .authentication_service
        .refresh_access_token(&token)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Refresh rejected");
            ApiError::authentication_failed()
        })?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        AccessTokenResponseData {
            access_token: access_token.access_token,
        },
    ))
}
