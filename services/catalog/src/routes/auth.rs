//! Login endpoint

use anyhow::Context;
use axum::{Json, extract::State, response::IntoResponse};
use axum_extra::extract::WithRejection;
use tracing::{info, warn};

use crate::{
    error::{ApiError, ApiResult},
    jwt::AuthFailure,
    models::user::{LoginRequest, TokenResponse},
    rate_limiter::Refusal,
    repositories::user::check_credentials,
    state::AppState,
    validation::validate_login,
};

/// Login endpoint
pub async fn login(
    State(state): State<AppState>,
    WithRejection(Json(request), _): WithRejection<Json<LoginRequest>, ApiError>,
) -> ApiResult<impl IntoResponse> {
    validate_login(&request)?;
    let username = request.username.trim();

    let attempt = match state.login_throttle.try_begin(username) {
        Ok(attempt) => attempt,
        Err(Refusal::LockedOut(remaining)) => {
            warn!(
                "Login refused for {}, locked out for another {}s",
                username,
                remaining.as_secs()
            );
            return Err(ApiError::TooManyAttempts);
        }
        Err(Refusal::Saturated) => {
            warn!("Login refused for {}, attempt limit in flight", username);
            return Err(ApiError::TooManyAttempts);
        }
    };

    let user = state
        .users
        .find_by_username(username)
        .await
        .context("Failed to look up user")?;

    let verified = check_credentials(user.as_ref(), &request.password)?;

    let Some(user) = user.filter(|_| verified) else {
        attempt.failed();
        warn!("Failed login for username {}", username);
        return Err(ApiError::Unauthenticated(AuthFailure::InvalidCredentials));
    };

    attempt.succeeded();

    let token = state
        .jwt_service
        .issue(&user)
        .context("Failed to issue access token")?;

    info!("User {} logged in", user.id);
    Ok(Json(TokenResponse { token }))
}
