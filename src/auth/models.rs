//! Authentication Models
//! Mission: Define user records, token claims and auth request bodies

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 8;

/// User account
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub photo: Option<String>,
    pub role: UserRole,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub password_changed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub password_reset_token: Option<String>,
    #[serde(skip_serializing)]
    pub password_reset_expires: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// True when the password changed after a token issued at `issued_at` (unix seconds).
    pub fn password_changed_after(&self, issued_at: i64) -> bool {
        match self.password_changed_at {
            Some(changed_at) => issued_at < changed_at.timestamp(),
            None => false,
        }
    }
}

/// User roles for RBAC
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub enum UserRole {
    #[default]
    #[serde(rename = "user")]
    User,
    #[serde(rename = "admin")]
    Admin,
}

impl UserRole {
    pub fn as_str(&self) -> &str {
        match self {
            UserRole::User => "user",
            UserRole::Admin => "admin",
        }
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(UserRole::User),
            "admin" => Ok(UserRole::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

/// JWT Claims payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (user_id)
    pub role: UserRole,
    pub iat: usize, // issued at
    pub exp: usize, // expiration timestamp
}

/// Fields needed to persist a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password: String,
    pub photo: Option<String>,
    pub role: UserRole,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
    pub photo: Option<String>,
}

impl SignupRequest {
    /// Validate and normalize into a storable user. Signup never grants a role.
    pub fn into_new_user(self) -> Result<NewUser, Vec<String>> {
        let mut errors = Vec::new();

        let name = self.name.trim().to_string();
        if name.is_empty() {
            errors.push("Please enter ur name!".to_string());
        }

        let email = normalize_email(&self.email);
        if email.is_empty() {
            errors.push("Please enter an email!".to_string());
        } else if !is_valid_email(&email) {
            errors.push("Please enter a valid email".to_string());
        }

        errors.extend(password_errors(&self.password, &self.confirm_password));

        if !errors.is_empty() {
            return Err(errors);
        }

        Ok(NewUser {
            name,
            email,
            password: self.password,
            photo: self.photo.filter(|p| !p.trim().is_empty()),
            role: UserRole::User,
        })
    }
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePasswordRequest {
    #[serde(default)]
    pub current_password: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub confirm_password: String,
}

/// User response (sanitized)
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    pub role: UserRole,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl UserResponse {
    pub fn from_user(user: &User) -> Self {
        Self {
            id: user.id.to_string(),
            name: user.name.clone(),
            email: user.email.clone(),
            photo: user.photo.clone(),
            role: user.role,
            password_changed_at: user.password_changed_at,
            created_at: user.created_at,
        }
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Structural check: one `@`, non-empty local part, dotted domain without empty labels.
pub fn is_valid_email(email: &str) -> bool {
    if email.chars().any(char::is_whitespace) {
        return false;
    }

    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };

    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return false;
    }

    domain.contains('.') && domain.split('.').all(|label| !label.is_empty())
}

/// Password rules shared by signup, reset and update.
pub fn password_errors(password: &str, confirm_password: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if password.is_empty() {
        errors.push("Please enter a password".to_string());
    } else if password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        ));
    }

    if confirm_password.is_empty() {
        errors.push("Please confirm ur password".to_string());
    } else if password != confirm_password {
        errors.push("Password and confirmPassword doesn't match".to_string());
    }

    errors
}
