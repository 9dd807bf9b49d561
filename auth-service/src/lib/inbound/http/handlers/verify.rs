use axum::extract::Query;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;

use super::AccessTokenResponseData;
use super::ApiError;
use super::ApiSuccess;
use crate::inbound::http::router::AppState;

#[derive(Debug, Clone, Deserialize)]
pub struct VerifyQuery {
    #[serde(default)]
    token: String,
}

/// Target of the link sent in the verification email.
pub async fn verify(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<ApiSuccess<AccessTokenResponseData>, ApiError> {
    let token = state
        .authentication_service
        .local_verification_email(&query.token)
        .await?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        AccessTokenResponseData {
            access_token: token.access_token,
        },
    ))
}
