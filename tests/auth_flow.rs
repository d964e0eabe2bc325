//! Signup, login, route guards and the password lifecycle, end to end.

mod common;

use axum::http::{header, StatusCode};
use chrono::Utc;
use common::{TestApp, PASSWORD};
use jsonwebtoken::{encode, EncodingKey, Header};
use movie_catalog_backend::auth::models::{Claims, UserRole};
use movie_catalog_backend::Config;
use serde_json::json;

fn signup_body(email: &str) -> serde_json::Value {
    json!({
        "name": "Ada Lovelace",
        "email": email,
        "password": PASSWORD,
        "confirmPassword": PASSWORD
    })
}

/// Sign a token with arbitrary timestamps using the test secret
fn forged_token(sub: &str, iat: i64, exp: i64) -> String {
    let claims = Claims {
        sub: sub.to_string(),
        role: UserRole::User,
        iat: iat as usize,
        exp: exp as usize,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(Config::default().jwt_secret.as_bytes()),
    )
    .unwrap()
}

#[tokio::test]
async fn test_signup_returns_token_cookie_and_user() {
    let app = TestApp::new();

    let res = app
        .post("/api/v1/users/signup", None, signup_body("  Ada@Example.com "))
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["status"], "Success");
    assert!(res.body["token"].as_str().is_some_and(|t| !t.is_empty()));
    assert_eq!(res.body["data"]["user"]["email"], "ada@example.com");
    assert_eq!(res.body["data"]["user"]["role"], "user");
    assert!(res.body["data"]["user"].get("passwordHash").is_none());

    let cookie = res.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.starts_with("jwt="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("Max-Age=7776000"));
    assert!(!cookie.contains("Secure"));
}

#[tokio::test]
async fn test_signup_cannot_claim_admin_role() {
    let app = TestApp::new();

    let mut body = signup_body("mallory@example.com");
    body["role"] = json!("admin");
    let res = app.post("/api/v1/users/signup", None, body).await;

    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["data"]["user"]["role"], "user");
}

#[tokio::test]
async fn test_signup_validation_and_duplicates() {
    let app = TestApp::new();

    let res = app
        .post(
            "/api/v1/users/signup",
            None,
            json!({"name": "Ada", "email": "not-an-email", "password": "short", "confirmPassword": "other"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], "fail");
    let message = res.body["message"].as_str().unwrap();
    assert!(message.starts_with("Invalid input data: "));
    assert!(message.contains("Please enter a valid email"));
    assert!(message.contains("Password must be at least 8 characters"));

    app.post("/api/v1/users/signup", None, signup_body("ada@example.com"))
        .await;
    let res = app
        .post("/api/v1/users/signup", None, signup_body("ada@example.com"))
        .await;
    assert_eq!(res.status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_login() {
    let app = TestApp::new();
    app.post("/api/v1/users/signup", None, signup_body("ada@example.com"))
        .await;

    let res = app
        .post("/api/v1/users/login", None, json!({"email": "ada@example.com"}))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        res.body["message"],
        "Please provide email ID & password for login IN!"
    );

    let res = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "ada@example.com", "password": "wrong-password"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Incorrect email or password");

    let res = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "nobody@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Incorrect email or password");

    let res = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "ADA@example.com", "password": PASSWORD}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["token"].is_string());
    assert!(res.headers.contains_key(header::SET_COOKIE));
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let app = TestApp::new();
    let res = app
        .request(
            axum::http::Method::POST,
            "/api/v1/users/login",
            None,
            Some(json!("just a string")),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], "fail");
}

#[tokio::test]
async fn test_protect_rejections() {
    let app = TestApp::new();
    let (user, _) = app.user_with_token("ada@example.com", UserRole::User);

    let res = app.get("/api/v1/movies", None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "You are not logged in!");

    let res = app.get("/api/v1/movies", Some("garbage")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Invalid token. Please login again!");

    let now = Utc::now().timestamp();
    let expired = forged_token(&user.id.to_string(), now - 7200, now - 3600);
    let res = app.get("/api/v1/movies", Some(&expired)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.body["message"],
        "Your session has expired. Please login again!"
    );

    let ghost = forged_token(&uuid::Uuid::new_v4().to_string(), now, now + 3600);
    let res = app.get("/api/v1/movies", Some(&ghost)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.body["message"],
        "The user with the given token doesnt exists!"
    );
}

#[tokio::test]
async fn test_token_issued_before_password_change_is_rejected() {
    let app = TestApp::new();
    let (user, token) = app.user_with_token("ada@example.com", UserRole::User);

    let now = Utc::now().timestamp();
    let stale = forged_token(&user.id.to_string(), now - 3600, now + 3600);

    let res = app
        .patch(
            "/api/v1/users/updatePassword",
            Some(&token),
            json!({
                "currentPassword": PASSWORD,
                "password": "brand-new-pass",
                "confirmPassword": "brand-new-pass"
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    let fresh = res.body["token"].as_str().unwrap().to_string();

    let res = app.get("/api/v1/movies", Some(&stale)).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        res.body["message"],
        "The password has been changed recently. Please login again!"
    );

    let res = app.get("/api/v1/movies", Some(&fresh)).await;
    assert_eq!(res.status, StatusCode::OK);

    let res = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "ada@example.com", "password": "brand-new-pass"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_update_password_requires_current_password() {
    let app = TestApp::new();
    let (_, token) = app.user_with_token("ada@example.com", UserRole::User);

    let res = app
        .patch(
            "/api/v1/users/updatePassword",
            Some(&token),
            json!({
                "currentPassword": "not-my-password",
                "password": "brand-new-pass",
                "confirmPassword": "brand-new-pass"
            }),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.body["message"], "Current Password isn't matched!");

    let res = app
        .patch(
            "/api/v1/users/updatePassword",
            None,
            json!({"currentPassword": PASSWORD}),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_forgot_and_reset_password() {
    let app = TestApp::new();
    app.user_with_token("ada@example.com", UserRole::User);

    let res = app
        .post(
            "/api/v1/users/forgotPassword",
            None,
            json!({"email": "nobody@example.com"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(
        res.body["message"],
        "We could not find the user with the given email!"
    );

    let res = app
        .post(
            "/api/v1/users/forgotPassword",
            None,
            json!({"email": "ada@example.com"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(
        res.body["message"],
        "password reset link send to the user email"
    );

    let email = app.mailer.sent.lock()[0].clone();
    assert_eq!(email.to, "ada@example.com");
    let prefix = "http://movies.test/api/v1/users/resetPassword/";
    let link = email
        .message
        .split_whitespace()
        .find(|w| w.starts_with(prefix))
        .unwrap()
        .to_string();
    let token = link.trim_start_matches(prefix).to_string();
    assert_eq!(token.len(), 64);

    let res = app
        .patch(
            "/api/v1/users/resetPassword/not-the-token",
            None,
            json!({"password": "reset-pass-1", "confirmPassword": "reset-pass-1"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Token is invalid or has expired!");

    let reset_uri = format!("/api/v1/users/resetPassword/{}", token);
    let res = app
        .patch(
            &reset_uri,
            None,
            json!({"password": "reset-pass-1", "confirmPassword": "mismatch"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .patch(
            &reset_uri,
            None,
            json!({"password": "reset-pass-1", "confirmPassword": "reset-pass-1"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.body["token"].is_string());

    // Single use
    let res = app
        .patch(
            &reset_uri,
            None,
            json!({"password": "reset-pass-2", "confirmPassword": "reset-pass-2"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app
        .post(
            "/api/v1/users/login",
            None,
            json!({"email": "ada@example.com", "password": "reset-pass-1"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
}

#[tokio::test]
async fn test_forgot_password_mail_failure_clears_token() {
    let app = TestApp::with_options(Config::default(), true);
    let (user, _) = app.user_with_token("ada@example.com", UserRole::User);

    let res = app
        .post(
            "/api/v1/users/forgotPassword",
            None,
            json!({"email": "ada@example.com"}),
        )
        .await;
    assert_eq!(res.status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(res.body["status"], "error");
    assert_eq!(
        res.body["message"],
        "There was an error sending password reset email. Please try again later!"
    );

    let stored = app.state.users.find_by_id(&user.id).unwrap().unwrap();
    assert!(stored.password_reset_token.is_none());
    assert!(stored.password_reset_expires.is_none());
}

#[tokio::test]
async fn test_production_cookie_is_secure() {
    let mut config = Config::default();
    config.app_env = movie_catalog_backend::config::AppEnv::Production;
    let app = TestApp::with_options(config, false);

    let res = app
        .post("/api/v1/users/signup", None, signup_body("ada@example.com"))
        .await;
    let cookie = res.headers[header::SET_COOKIE].to_str().unwrap();
    assert!(cookie.ends_with("; Secure"));
}
