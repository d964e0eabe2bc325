//! Runtime configuration
//! Mission: Read every tunable from the environment once at startup

use anyhow::{Context, Result};
use std::env;
use std::path::Path;
use std::time::Duration;
use tracing::warn;

const DEV_JWT_SECRET: &str = "dev-secret-change-in-production-minimum-32-characters";

/// Deployment mode. Production hides internal error details and marks cookies `Secure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub app_env: AppEnv,
    pub bind_addr: String,
    pub port: u16,
    pub database_path: String,
    pub jwt_secret: String,
    pub login_expires: Duration,
    pub jwt_cookie_expires_days: i64,
    pub rate_limit_max: u32,
    pub rate_limit_window: Duration,
    pub body_limit_bytes: usize,
    pub mail_api_url: Option<String>,
    pub mail_api_key: Option<String>,
    pub mail_from: String,
    pub public_base_url: Option<String>,
    pub movie_creator: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            app_env: AppEnv::Development,
            bind_addr: "0.0.0.0".to_string(),
            port: 3000,
            database_path: "movie_catalog.db".to_string(),
            jwt_secret: DEV_JWT_SECRET.to_string(),
            login_expires: Duration::from_secs(24 * 3600),
            jwt_cookie_expires_days: 90,
            rate_limit_max: 100,
            rate_limit_window: Duration::from_secs(3600),
            body_limit_bytes: 10 * 1024,
            mail_api_url: None,
            mail_api_key: None,
            mail_from: "Movie Catalog <noreply@moviecatalog.local>".to_string(),
            public_base_url: None,
            movie_creator: "Thee".to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let app_env = match env::var("APP_ENV")
            .or_else(|_| env::var("NODE_ENV"))
            .unwrap_or_default()
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => AppEnv::Production,
            _ => AppEnv::Development,
        };

        let jwt_secret = match non_empty("JWT_SECRET").or_else(|| non_empty("SECRET_STR")) {
            Some(secret) => secret,
            None => {
                if app_env == AppEnv::Production {
                    anyhow::bail!("JWT_SECRET must be set in production");
                }
                warn!("⚠️  JWT_SECRET not set, using development secret");
                defaults.jwt_secret.clone()
            }
        };

        let login_expires = parse_var::<u64>("LOGIN_EXPIRES_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.login_expires);

        let rate_limit_window = parse_var::<u64>("RATE_LIMIT_WINDOW_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.rate_limit_window);

        let config = Self {
            app_env,
            bind_addr: non_empty("BIND_ADDR").unwrap_or(defaults.bind_addr),
            port: parse_var("PORT")?.unwrap_or(defaults.port),
            database_path: non_empty("DATABASE_PATH")
                .or_else(|| non_empty("DB_PATH"))
                .unwrap_or(defaults.database_path),
            jwt_secret,
            login_expires,
            jwt_cookie_expires_days: parse_var("JWT_COOKIE_EXPIRES_DAYS")?
                .unwrap_or(defaults.jwt_cookie_expires_days),
            rate_limit_max: parse_var("RATE_LIMIT_MAX")?.unwrap_or(defaults.rate_limit_max),
            rate_limit_window,
            body_limit_bytes: parse_var("BODY_LIMIT_BYTES")?.unwrap_or(defaults.body_limit_bytes),
            mail_api_url: non_empty("MAIL_API_URL"),
            mail_api_key: non_empty("MAIL_API_KEY"),
            mail_from: non_empty("MAIL_FROM").unwrap_or(defaults.mail_from),
            public_base_url: non_empty("PUBLIC_BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string()),
            movie_creator: non_empty("MOVIE_CREATOR").unwrap_or(defaults.movie_creator),
        };

        config.validate()?;
        Ok(config)
    }

    /// Production must not fall back to the log mailer, which would write
    /// live reset links into the logs.
    pub fn validate(&self) -> Result<()> {
        if self.is_production() && !self.mail_configured() {
            anyhow::bail!("MAIL_API_URL and MAIL_API_KEY must be set in production");
        }
        Ok(())
    }

    pub fn mail_configured(&self) -> bool {
        self.mail_api_url.is_some() && self.mail_api_key.is_some()
    }

    pub fn is_production(&self) -> bool {
        self.app_env == AppEnv::Production
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Load `.env` from the working directory, then from the crate root.
pub fn load_env() {
    let _ = dotenv::dotenv();

    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    for candidate in [manifest_dir.join(".env"), manifest_dir.join("config.env")] {
        if candidate.exists() {
            let _ = dotenv::from_path(&candidate);
        }
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_var<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match non_empty(key) {
        Some(raw) => raw
            .parse::<T>()
            .map(Some)
            .with_context(|| format!("Invalid value for {}: {:?}", key, raw)),
        None => Ok(None),
    }
}
