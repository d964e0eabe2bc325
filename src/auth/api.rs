//! Authentication API Endpoints
//! Mission: Signup, login and the password lifecycle (forgot, reset, update)

use crate::app::AppState;
use crate::auth::{
    middleware::CurrentUser,
    models::{
        normalize_email, password_errors, ForgotPasswordRequest, LoginRequest,
        ResetPasswordRequest, SignupRequest, UpdatePasswordRequest, User, UserResponse,
    },
    password::{verify_against_dummy, verify_password},
    reset_token::{hash_reset_token, ResetToken, RESET_TOKEN_TTL_MINUTES},
};
use crate::error::{ApiError, ApiJson, ApiResult};
use crate::mailer::Email;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{info, warn};

/// Signup endpoint - POST /api/v1/users/signup
pub async fn signup(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SignupRequest>,
) -> ApiResult<Response> {
    let new_user = payload.into_new_user().map_err(ApiError::Validation)?;
    let user = state.users.create_user(&new_user)?;

    info!(user_id = %user.id, "👤 New signup");
    send_token(&state, &user, StatusCode::CREATED)
}

/// Login endpoint - POST /api/v1/users/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Response> {
    let (email, password) = match (payload.email, payload.password) {
        (Some(email), Some(password)) if !email.trim().is_empty() && !password.is_empty() => {
            (normalize_email(&email), password)
        }
        _ => {
            return Err(ApiError::bad_request(
                "Please provide email ID & password for login IN!",
            ))
        }
    };

    let user = match state.users.find_by_email(&email)? {
        Some(user) => user,
        None => {
            // Same bcrypt cost as a real check
            verify_against_dummy(&password);
            warn!("❌ Failed login attempt (unknown account)");
            return Err(ApiError::bad_request("Incorrect email or password"));
        }
    };

    if !verify_password(&password, &user.password_hash)? {
        warn!(user_id = %user.id, "❌ Failed login attempt");
        return Err(ApiError::bad_request("Incorrect email or password"));
    }

    info!(user_id = %user.id, role = user.role.as_str(), "✅ Login successful");
    send_token(&state, &user, StatusCode::OK)
}

/// Forgot password endpoint - POST /api/v1/users/forgotPassword
pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    ApiJson(payload): ApiJson<ForgotPasswordRequest>,
) -> ApiResult<Response> {
    let email = payload.email.as_deref().map(normalize_email).unwrap_or_default();
    let user = state
        .users
        .find_by_email(&email)?
        .ok_or_else(|| ApiError::not_found("We could not find the user with the given email!"))?;

    let token = ResetToken::generate();
    state
        .users
        .set_reset_token(&user.id, &token.digest, token.expires_at)?;

    let reset_url = format!(
        "{}/api/v1/users/resetPassword/{}",
        public_base_url(&state, &headers),
        token.plaintext
    );
    let message = format!(
        "We have received a password reset request. Please use the below link to reset your password\n\n{}\n\nThis reset password link will be valid only for {} minutes.",
        reset_url, RESET_TOKEN_TTL_MINUTES
    );

    let sent = state
        .mailer
        .send(Email {
            to: user.email.clone(),
            subject: "Password change request received".to_string(),
            message,
        })
        .await;

    if let Err(e) = sent {
        warn!(user_id = %user.id, error = %e, "Reset e-mail failed, discarding token");
        state.users.clear_reset_token(&user.id)?;
        return Err(ApiError::Unavailable(
            "There was an error sending password reset email. Please try again later!".to_string(),
        ));
    }

    info!(user_id = %user.id, "📧 Password reset link issued");
    Ok(Json(json!({
        "status": "Success",
        "message": "password reset link send to the user email"
    }))
    .into_response())
}

/// Reset password endpoint - PATCH /api/v1/users/resetPassword/:token
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(payload): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Response> {
    let now = Utc::now();
    let digest = hash_reset_token(&token);
    if state.users.find_by_reset_token(&digest, now)?.is_none() {
        return Err(ApiError::bad_request("Token is invalid or has expired!"));
    }

    let errors = password_errors(&payload.password, &payload.confirm_password);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    // Back-dated so a token issued in the same second stays valid.
    // A concurrent reset may have consumed the token since the lookup.
    let user = state
        .users
        .consume_reset_token(&digest, now, &payload.password, now - Duration::seconds(1))?
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired!"))?;

    send_token(&state, &user, StatusCode::OK)
}

/// Update password endpoint - PATCH /api/v1/users/updatePassword (protected)
pub async fn update_password(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    ApiJson(payload): ApiJson<UpdatePasswordRequest>,
) -> ApiResult<Response> {
    if !verify_password(&payload.current_password, &current.password_hash)? {
        return Err(ApiError::unauthorized("Current Password isn't matched!"));
    }

    let errors = password_errors(&payload.password, &payload.confirm_password);
    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let user = state
        .users
        .update_password(
            &current.id,
            &payload.password,
            Utc::now() - Duration::seconds(1),
        )?
        .ok_or_else(|| ApiError::unauthorized("The user with the given token doesnt exists!"))?;

    send_token(&state, &user, StatusCode::OK)
}

/// Issue a session token as both a `jwt` cookie and the response body
fn send_token(state: &AppState, user: &User, status: StatusCode) -> ApiResult<Response> {
    let (token, _expires_in) = state.jwt.generate_token(user)?;

    let cookie = session_cookie(
        &token,
        state.config.jwt_cookie_expires_days,
        state.config.is_production(),
    );
    let cookie = HeaderValue::from_str(&cookie)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid cookie header: {}", e)))?;

    let body = json!({
        "status": "Success",
        "token": token,
        "data": { "user": UserResponse::from_user(user) }
    });

    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

fn session_cookie(token: &str, expires_days: i64, secure: bool) -> String {
    let mut cookie = format!(
        "jwt={}; HttpOnly; Path=/; Max-Age={}",
        token,
        expires_days.saturating_mul(24 * 60 * 60)
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Configured public URL, else `http://<Host>`
fn public_base_url(state: &AppState, headers: &HeaderMap) -> String {
    if let Some(base) = &state.config.public_base_url {
        return base.trim_end_matches('/').to_string();
    }

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}", host)
}
