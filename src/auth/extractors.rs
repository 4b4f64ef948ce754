use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};
use tracing::warn;

use super::{claims::Role, jwt::JwtKeys};
use crate::rest::{ApiError, MSG_INVALID_ID};

pub const MSG_MISSING_HEADER: &str = "Authorization header is missing";
pub const MSG_MISSING_BEARER: &str = "Bearer token is missing";
pub const MSG_INVALID_TOKEN: &str = "Invalid token";
pub const MSG_NOT_VERIFIED: &str = "User is not verified";
pub const MSG_INSUFFICIENT_RIGHTS: &str = "Insufficient rights";

/// Path segment that stands for the caller's own id.
pub const SELF_ALIAS: &str = "me";

fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::unauthorized(MSG_MISSING_HEADER))?;

    header
        .strip_prefix("Bearer ")
        .or_else(|| header.strip_prefix("bearer "))
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::unauthorized(MSG_MISSING_BEARER))
}

/// Caller authenticated with an access token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser {
    pub id: i64,
    pub role: Role,
    pub verified: bool,
}

impl AuthUser {
    pub fn require_verified(&self) -> Result<(), ApiError> {
        if self.verified {
            Ok(())
        } else {
            Err(ApiError::forbidden(MSG_NOT_VERIFIED))
        }
    }

    pub fn require_role(&self, roles: &[Role]) -> Result<(), ApiError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(ApiError::forbidden(MSG_INSUFFICIENT_RIGHTS))
        }
    }

    /// Resolves a `/:id` segment. `me` is the caller; anyone else needs one of `roles`.
    pub fn resolve_target(&self, raw: &str, roles: &[Role]) -> Result<i64, ApiError> {
        if raw == SELF_ALIAS {
            return Ok(self.id);
        }
        let id = raw
            .parse::<i64>()
            .map_err(|_| ApiError::bad_request(MSG_INVALID_ID))?;
        if id == self.id {
            return Ok(id);
        }
        self.require_role(roles)?;
        Ok(id)
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts)?;

        let claims = keys.verify_access(token).map_err(|e| {
            warn!(error = %e, "invalid access token");
            ApiError::unauthorized(MSG_INVALID_TOKEN)
        })?;
        let id = claims
            .user_id()
            .map_err(|_| ApiError::unauthorized(MSG_INVALID_TOKEN))?;

        Ok(AuthUser {
            id,
            role: claims.data.role,
            verified: claims.data.verified,
        })
    }
}

/// Verified caller with the ADMIN role.
#[derive(Debug, Clone, Copy)]
pub struct AdminUser(pub AuthUser);

#[async_trait]
impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        user.require_verified()?;
        user.require_role(&[Role::Admin])?;
        Ok(AdminUser(user))
    }
}

/// Caller presenting a refresh token in the bearer header.
#[derive(Debug, Clone, Copy)]
pub struct RefreshUser(pub i64);

#[async_trait]
impl<S> FromRequestParts<S> for RefreshUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);
        let token = bearer_token(parts)?;
        let id = keys
            .verify_refresh(token)
            .and_then(|claims| claims.user_id())
            .map_err(|e| {
                warn!(error = %e, "invalid refresh token");
                ApiError::unauthorized(MSG_INVALID_TOKEN)
            })?;
        Ok(RefreshUser(id))
    }
}
