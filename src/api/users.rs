//! User API
//! Mission: Account routes (auth flow plus self-service profile management)
//!
//! Mounted under `/api/v1/users`.

use crate::app::AppState;
use crate::auth::{
    api::{forgot_password, login, reset_password, signup, update_password},
    models::{is_valid_email, normalize_email, UserResponse, UserRole},
    protect, restrict, CurrentUser,
};
use crate::error::{ApiError, ApiJson, ApiResult};
use axum::{
    extract::State,
    handler::Handler,
    http::StatusCode,
    middleware::from_fn_with_state,
    routing::{delete, get, patch, post},
    Json, Router,
};
use serde_json::{json, Value};
use tracing::info;

pub fn user_routes(state: &AppState) -> Router<AppState> {
    let protected = from_fn_with_state(state.clone(), protect);
    let admin_only = from_fn_with_state(UserRole::Admin, restrict);

    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/forgotPassword", post(forgot_password))
        .route("/resetPassword/:token", patch(reset_password))
        .route(
            "/updatePassword",
            patch(update_password.layer(protected.clone())),
        )
        .route("/updateMe", patch(update_me.layer(protected.clone())))
        .route("/deleteMe", delete(delete_me.layer(protected.clone())))
        .route(
            "/",
            get(get_all_users.layer(admin_only).layer(protected))
                .post(not_defined),
        )
        .route(
            "/:id",
            get(not_defined).patch(not_defined).delete(not_defined),
        )
}

/// GET / - every active account (admin only)
pub async fn get_all_users(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let users: Vec<UserResponse> = state
        .users
        .list_active()?
        .iter()
        .map(UserResponse::from_user)
        .collect();

    Ok(Json(json!({
        "status": "Success",
        "results": users.len(),
        "data": { "users": users }
    })))
}

/// PATCH /updateMe - change name and/or email; password fields are refused
pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
    ApiJson(body): ApiJson<Value>,
) -> ApiResult<Json<Value>> {
    let has_password_field = ["password", "confirmPassword"]
        .iter()
        .any(|key| body.get(key).is_some_and(is_truthy));
    if has_password_field {
        return Err(ApiError::bad_request(
            "This route is not for updating password. Please use /updatePassword",
        ));
    }

    let mut errors = Vec::new();

    let name = match body.get("name") {
        None | Some(Value::Null) => None,
        Some(Value::String(name)) if !name.trim().is_empty() => Some(name.trim().to_string()),
        Some(_) => {
            errors.push("Please enter ur name!".to_string());
            None
        }
    };

    let email = match body.get("email") {
        None | Some(Value::Null) => None,
        Some(Value::String(email)) if is_valid_email(&normalize_email(email)) => {
            Some(normalize_email(email))
        }
        Some(_) => {
            errors.push("Please enter a valid email".to_string());
            None
        }
    };

    if !errors.is_empty() {
        return Err(ApiError::Validation(errors));
    }

    let user = state
        .users
        .update_profile(&current.id, name.as_deref(), email.as_deref())?
        .ok_or_else(|| ApiError::unauthorized("The user with the given token doesnt exists!"))?;

    info!(user_id = %user.id, "👤 Profile updated");

    Ok(Json(json!({
        "status": "Success",
        "data": { "user": UserResponse::from_user(&user) }
    })))
}

/// DELETE /deleteMe - soft delete of the caller's account
pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(current): CurrentUser,
) -> ApiResult<StatusCode> {
    state.users.deactivate(&current.id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Placeholder for admin user management
pub async fn not_defined() -> ApiError {
    ApiError::NotDefined
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        _ => true,
    }
}
