use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use super::MessageResponseData;
use crate::authentication::errors::EmailError;
use crate::authentication::errors::PasswordPolicyError;
use crate::authentication::models::EmailAddress;
use crate::authentication::models::Password;
use crate::authentication::models::PasswordResetCommand;
use crate::inbound::http::router::AppState;

const FORGOT_ACCEPTED: &str =
    "If the address belongs to a verified account, a reset link is on its way";

/// Request a password reset email.
///
/// Answers the same way whether or not the address has an account.
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<ApiSuccess<MessageResponseData>, ApiError> {
    let email = EmailAddress::new(body.email).map_err(ParsePasswordRequestError::from)?;

    state
        .authentication_service
        .local_password_forgot(email)
        .await?;

    Ok(ApiSuccess::new(
        StatusCode::ACCEPTED,
        MessageResponseData::new(FORGOT_ACCEPTED),
    ))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<ApiSuccess<MessageResponseData>, ApiError> {
    state
        .authentication_service
        .local_password_reset(body.try_into_command()?)
        .await?;

    Ok(ApiSuccess::new(
        StatusCode::OK,
        MessageResponseData::new("Password updated, please sign in again"),
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ForgotPasswordRequest {
    email: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    token: String,
    new_password: String,
}

#[derive(Debug, Clone, Error)]
enum ParsePasswordRequestError {
    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("Invalid password: {0}")]
    Password(#[from] PasswordPolicyError),
}

impl ResetPasswordRequest {
    fn try_into_command(self) -> Result<PasswordResetCommand, ParsePasswordRequestError> {
        Ok(PasswordResetCommand {
            token: self.token,
            new_password: Password::new(self.new_password)?,
        })
    }
}

impl From<ParsePasswordRequestError> for ApiError {
    fn from(err: ParsePasswordRequestError) -> Self {
        ApiError::UnprocessableEntity(err.to_string())
    }
}
