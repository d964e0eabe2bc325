//! JWT Token Handler
//! Mission: Issue and verify signed, time-limited session tokens

use crate::auth::models::{Claims, User};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, DecodingKey, EncodingKey, Header, Validation,
};
use std::time::Duration;
use tracing::debug;

/// Why a presented token was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenError {
    Expired,
    Invalid,
}

/// JWT Handler for token operations
pub struct JwtHandler {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    ttl: Duration,
}

impl JwtHandler {
    pub fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    /// Generate a JWT token for a user, returning it with its lifetime in seconds
    pub fn generate_token(&self, user: &User) -> Result<(String, usize)> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(self.ttl).context("Token lifetime out of range")?;
        let expiration = now
            .checked_add_signed(ttl)
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let claims = Claims {
            sub: user.id.to_string(),
            role: user.role,
            iat: now.timestamp() as usize,
            exp: expiration,
        };

        debug!(
            user_id = %user.id,
            ttl_secs = self.ttl.as_secs(),
            "Generating session token"
        );

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .context("Failed to generate JWT")?;

        Ok((token, self.ttl.as_secs() as usize))
    }

    /// Validate a JWT token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::default();
        validation.leeway = 0;

        let decoded = decode::<Claims>(token, &self.decoding_key, &validation).map_err(|e| {
            match e.kind() {
                ErrorKind::ExpiredSignature => TokenError::Expired,
                _ => TokenError::Invalid,
            }
        })?;

        debug!(user_id = %decoded.claims.sub, "Validated session token");

        Ok(decoded.claims)
    }
}
