//! Authentication Middleware
//! Mission: Protect API endpoints with bearer-token validation and role checks

use crate::app::AppState;
use crate::auth::{jwt::TokenError, models::User, models::UserRole};
use crate::error::ApiError;
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;
use uuid::Uuid;

/// The authenticated account, attached by [`protect`]
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("You are not logged in!"))
    }
}

/// Require a valid bearer token whose account still exists and whose
/// password hasn't changed since the token was issued.
pub async fn protect(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(&req).ok_or_else(|| ApiError::unauthorized("You are not logged in!"))?;

    let claims = state.jwt.validate_token(&token).map_err(|e| match e {
        TokenError::Expired => {
            ApiError::unauthorized("Your session has expired. Please login again!")
        }
        TokenError::Invalid => ApiError::unauthorized("Invalid token. Please login again!"),
    })?;

    let user = match Uuid::parse_str(&claims.sub) {
        Ok(id) => state.users.find_by_id(&id)?,
        Err(_) => None,
    }
    .ok_or_else(|| ApiError::unauthorized("The user with the given token doesnt exists!"))?;

    if user.password_changed_after(claims.iat as i64) {
        return Err(ApiError::unauthorized(
            "The password has been changed recently. Please login again!",
        ));
    }

    debug!(user_id = %user.id, role = user.role.as_str(), "Request authenticated");
    req.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(req).await)
}

/// Only let through users holding `role`. Must run after [`protect`].
pub async fn restrict(
    State(role): State<UserRole>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let user = req
        .extensions()
        .get::<CurrentUser>()
        .ok_or_else(|| ApiError::unauthorized("You are not logged in!"))?;

    if user.0.role != role {
        return Err(ApiError::Forbidden(
            "You do not have permission to perform this action!".to_string(),
        ));
    }

    Ok(next.run(req).await)
}

/// `Authorization: Bearer <token>`; the token is the second space-separated part
fn bearer_token(req: &Request) -> Option<String> {
    let header = req.headers().get(AUTHORIZATION)?.to_str().ok()?;
    if !header.starts_with("Bearer") {
        return None;
    }
    header
        .split(' ')
        .nth(1)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}
