//! Access gate extractors

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use tracing::debug;

use crate::{
    error::ApiError,
    jwt::Identity,
    models::user::Role,
    state::AppState,
};

/// Any authenticated caller
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub Identity);

/// Authenticated caller holding the admin role
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub Identity);

/// Reject the identity unless it carries the required role
pub fn require_role(identity: Identity, role: Role) -> Result<Identity, ApiError> {
    if identity.role == role {
        Ok(identity)
    } else {
        debug!(
            "User {} with role {} denied, {} required",
            identity.user_id, identity.role, role
        );
        Err(ApiError::Forbidden)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok());

        state
            .jwt_service
            .verify_header(header)
            .map(AuthUser)
            .map_err(ApiError::Unauthenticated)
    }
}

#[async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let AuthUser(identity) = AuthUser::from_request_parts(parts, state).await?;
        require_role(identity, Role::Admin).map(AdminUser)
    }
}
