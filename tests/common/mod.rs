//! Shared harness for router-level tests.

#![allow(dead_code)]

use anyhow::Result;
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, HeaderMap, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use movie_catalog_backend::{
    auth::models::{NewUser, User, UserRole},
    auth::UserStore,
    build_router,
    mailer::{Email, Mailer},
    movies::{MovieStore, NewMovie},
    AppState, Config,
};
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tower::ServiceExt;

pub const PASSWORD: &str = "password123";

/// Records outgoing mail; can be switched to fail every send
#[derive(Default)]
pub struct CapturingMailer {
    pub sent: Mutex<Vec<Email>>,
    pub fail: bool,
}

#[async_trait]
impl Mailer for CapturingMailer {
    async fn send(&self, email: Email) -> Result<()> {
        if self.fail {
            anyhow::bail!("mail API unreachable");
        }
        self.sent.lock().push(email);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub mailer: Arc<CapturingMailer>,
    _db: NamedTempFile,
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_options(Config::default(), false)
    }

    pub fn with_options(mut config: Config, failing_mailer: bool) -> Self {
        let db = NamedTempFile::new().unwrap();
        let db_path = db.path().to_str().unwrap().to_string();
        config.database_path = db_path.clone();
        config.public_base_url = Some("http://movies.test".to_string());

        let users = Arc::new(UserStore::with_hash_cost(&db_path, 4).unwrap());
        let movies = Arc::new(MovieStore::new(&db_path).unwrap());
        let mailer = Arc::new(CapturingMailer {
            sent: Mutex::new(Vec::new()),
            fail: failing_mailer,
        });

        let state = AppState::with_parts(config, users, movies, mailer.clone());
        let router = build_router(state.clone());

        Self {
            router,
            state,
            mailer,
            _db: db,
        }
    }

    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, uri, token, None).await
    }

    pub async fn post(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::POST, uri, token, Some(body)).await
    }

    pub async fn patch(&self, uri: &str, token: Option<&str>, body: Value) -> TestResponse {
        self.request(Method::PATCH, uri, token, Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, uri, token, None).await
    }

    /// Store a user directly and return it with a fresh session token
    pub fn user_with_token(&self, email: &str, role: UserRole) -> (User, String) {
        let user = self
            .state
            .users
            .create_user(&NewUser {
                name: "Test User".to_string(),
                email: email.to_string(),
                password: PASSWORD.to_string(),
                photo: None,
                role,
            })
            .unwrap();
        let (token, _) = self.state.jwt.generate_token(&user).unwrap();
        (user, token)
    }

    pub fn add_movie(&self, movie: NewMovie) -> String {
        self.state.movies.create(&movie).unwrap().id.to_string()
    }
}

pub fn released_movie(name: &str, ratings: f64, price: f64, genres: &[&str]) -> NewMovie {
    NewMovie {
        name: name.to_string(),
        description: format!("{} description", name),
        duration: 120.0,
        ratings: Some(ratings),
        total_ratings: Some(100.0),
        release_year: 2015,
        release_date: Some(Utc::now() - Duration::days(30)),
        created_at: None,
        genres: genres.iter().map(|g| g.to_string()).collect(),
        directors: vec!["Director".to_string()],
        cover_image: format!("{}.jpg", name),
        actors: vec!["Actor".to_string()],
        price,
    }
}
