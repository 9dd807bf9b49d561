use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use super::ApiError;
use super::ApiSuccess;
use crate::authentication::errors::EmailError;
use crate::authentication::errors::PasswordPolicyError;
use crate::authentication::errors::UsernameError;
use crate::authentication::models::AuthenticationRecord;
use crate::authentication::models::EmailAddress;
use crate::authentication::models::LocalSignUpCommand;
use crate::authentication::models::Password;
use crate::authentication::models::Username;
use crate::inbound::http::router::AppState;

pub async fn sign_up(
    State(state): State<AppState>,
    Json(body): Json<SignUpRequest>,
) -> Result<ApiSuccess<SignUpResponseData>, ApiError> {
    state
        .authentication_service
        .local_sign_up(body.try_into_command()?)
        .await
        .map_err(ApiError::from)
        .map(|ref record| ApiSuccess::new(StatusCode::CREATED, record.into()))
}

/// HTTP request body for a local sign-up (raw JSON)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    username: String,
    email: String,
    password: String,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Clone, Error)]
enum ParseSignUpRequestError {
    #[error("Invalid username: {0}")]
    Username(#[from] UsernameError),

    #[error("Invalid email: {0}")]
    Email(#[from] EmailError),

    #[error("Invalid password: {0}")]
    Password(#[from] PasswordPolicyError),
}

impl SignUpRequest {
    fn try_into_command(self) -> Result<LocalSignUpCommand, ParseSignUpRequestError> {
        Ok(LocalSignUpCommand {
            username: Username::new(self.username)?,
            first_name: self.first_name,
            last_name: self.last_name,
            email: EmailAddress::new(self.email)?,
            avatar_url: self.avatar_url,
            password: Password::new(self.password)?,
        })
    }
}

impl From<ParseSignUpRequestError> for ApiError {
    fn from(err: ParseSignUpRequestError) -> Self {
        ApiError::UnprocessableEntity(err.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponseData {
    pub user_id: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

impl From<&AuthenticationRecord> for SignUpResponseData {
    fn from(record: &AuthenticationRecord) -> Self {
        Self {
            user_id: record.user_id.to_string(),
            provider: record.provider.to_string(),
            created_at: record.created_at,
        }
    }
}
