//! Application assembly
//! Mission: Wire stores, services and middleware into one router

use crate::api::{movies::movie_routes, users::user_routes};
use crate::auth::{JwtHandler, UserStore};
use crate::config::Config;
use crate::error::route_not_found;
use crate::mailer::{HttpMailer, LogMailer, Mailer};
use crate::middleware::{
    rate_limit_middleware, request_logging, stamp_request_time, with_security_headers,
    RateLimitConfig, RateLimitLayer,
};
use crate::movies::MovieStore;
use anyhow::Result;
use axum::{
    extract::DefaultBodyLimit,
    middleware::{from_fn, from_fn_with_state},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Application state shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub users: Arc<UserStore>,
    pub movies: Arc<MovieStore>,
    pub jwt: Arc<JwtHandler>,
    pub mailer: Arc<dyn Mailer>,
    pub rate_limiter: RateLimitLayer,
}

impl AppState {
    /// Open the stores and pick a mailer from `config`
    pub fn from_config(config: Config) -> Result<Self> {
        config.validate()?;

        let users = Arc::new(UserStore::new(&config.database_path)?);
        let movies = Arc::new(
            MovieStore::new(&config.database_path)?.with_creator(config.movie_creator.clone()),
        );

        let mailer: Arc<dyn Mailer> = match (&config.mail_api_url, &config.mail_api_key) {
            (Some(url), Some(key)) => {
                info!(api = %url, "📧 Using HTTP mail API");
                Arc::new(HttpMailer::new(
                    url.clone(),
                    key.clone(),
                    config.mail_from.clone(),
                )?)
            }
            _ => {
                info!("📧 Mail API not configured, reset links go to the log");
                Arc::new(LogMailer)
            }
        };

        Ok(Self::with_parts(config, users, movies, mailer))
    }

    pub fn with_parts(
        config: Config,
        users: Arc<UserStore>,
        movies: Arc<MovieStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        let jwt = Arc::new(JwtHandler::new(&config.jwt_secret, config.login_expires));
        let rate_limiter = RateLimitLayer::new(RateLimitConfig {
            max_requests: config.rate_limit_max,
            window: config.rate_limit_window,
        });

        Self {
            config: Arc::new(config),
            users,
            movies,
            jwt,
            mailer,
            rate_limiter,
        }
    }
}

/// Full HTTP surface: `/api/v1/*`, `/health` and the not-found fallback
pub fn build_router(state: AppState) -> Router {
    // Only the API counts against the per-IP budget
    let api = Router::new()
        .nest("/api/v1/movies", movie_routes(&state))
        .nest("/api/v1/users", user_routes(&state))
        .layer(DefaultBodyLimit::max(state.config.body_limit_bytes))
        .layer(from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    let app = Router::new()
        .route("/health", get(health_check))
        .merge(api)
        .fallback(route_not_found)
        .layer(from_fn(stamp_request_time))
        .layer(CorsLayer::permissive())
        .with_state(state);

    with_security_headers(app)
        .layer(from_fn(request_logging))
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": Utc::now().to_rfc3339(),
    }))
}
