use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::Request;
use axum::http::Response;
use axum::middleware;
use axum::routing::get;
use axum::routing::post;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::Span;

use super::handlers::password::forgot_password;
use super::handlers::password::reset_password;
use super::handlers::profile::profile;
use super::handlers::refresh::refresh;
use super::handlers::sign_in::sign_in;
use super::handlers::sign_out::sign_out;
use super::handlers::sign_up::sign_up;
use super::handlers::verify::verify;
use super::middleware::authenticate as auth_middleware;
use crate::authentication::ports::AuthenticationServicePort;
use crate::authentication::strategy::CredentialStrategy;
use crate::authentication::strategy::LocalCredentials;

pub type LocalStrategyHandle = Arc<dyn CredentialStrategy<Credentials = LocalCredentials>>;

#[derive(Clone)]
pub struct AppState {
    pub authentication_service: Arc<dyn AuthenticationServicePort>,
    pub local_strategy: LocalStrategyHandle,
    /// Mark the refresh token cookie Secure; set when served over https.
    pub secure_cookies: bool,
}

pub fn create_router(
    authentication_service: Arc<dyn AuthenticationServicePort>,
    local_strategy: LocalStrategyHandle,
    secure_cookies: bool,
) -> Router {
    let state = AppState {
        authentication_service,
        local_strategy,
        secure_cookies,
    };

    let public_routes = Router::new()
        .route("/api/auth/local/sign-up", post(sign_up))
        .route("/api/auth/local/verify", get(verify))
        .route("/api/auth/local/sign-in", post(sign_in))
        .route("/api/auth/local/password/forgot", post(forgot_password))
        .route("/api/auth/local/password/reset", post(reset_password))
        .route("/api/auth/refresh", post(refresh));

    let protected_routes = Router::new()
        .route("/api/auth/sign-out", post(sign_out))
        .route("/api/auth/profile", get(profile))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    // Headers are left out of the span: they carry bearer tokens and cookies.
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(|request: &Request<Body>| {
            tracing::info_span!(
                "http_request",
                method = %request.method(),
                uri = %request.uri().path(),
                version = ?request.version(),
            )
        })
        .on_request(|request: &Request<Body>, _span: &Span| {
            tracing::info!(
                method = %request.method(),
                path = %request.uri().path(),
                "Request started"
            );
        })
        .on_response(
            |response: &Response<Body>, latency: Duration, _span: &Span| {
                tracing::info!(
                    status = response.status().as_u16(),
                    latency_ms = latency.as_millis(),
                    "Request completed"
                );
            },
        );

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(trace_layer)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
