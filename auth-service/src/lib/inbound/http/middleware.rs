use auth::TokenPayload;
use axum::extract::Request;
use axum::extract::State;
use axum::http;
use axum::middleware::Next;
use axum::response::IntoResponse;
use axum::response::Response;

use super::handlers::ApiError;
use crate::inbound::http::router::AppState;

/// Verified access token payload, stored in the request extensions of guarded routes.
#[derive(Debug, Clone)]
pub struct AuthenticatedPrincipal(pub TokenPayload);

/// Middleware that verifies the bearer access token and rejects revoked ones.
pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_token_from_header(&req)?;

    let payload = state
        .authentication_service
        .authenticate_access_token(token)
        .await
        .map_err(|e| {
            tracing::warn!(error = %e, "Access token rejected");
            ApiError::authentication_failed().into_response()
        })?;

    req.extensions_mut().insert(AuthenticatedPrincipal(payload));

    Ok(next.run(req).await)
}

fn extract_token_from_header(req: &Request) -> Result<&str, Response> {
    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .ok_or_else(|| {
            ApiError::Unauthorized("Missing Authorization header".to_string()).into_response()
        })?;

    let auth_str = auth_header.to_str().map_err(|_| {
        ApiError::Unauthorized("Invalid Authorization header".to_string()).into_response()
    })?;

    auth_str
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::Unauthorized(
                "Invalid Authorization header format. Expected: Bearer <token>".to_string(),
            )
            .into_response()
        })
}
