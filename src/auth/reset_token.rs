//! Password reset tokens
//! Mission: One-time, hashed, expiring tokens for the forgot-password flow
//!
//! The plaintext token only ever leaves the server in the reset e-mail; the
//! store keeps its SHA-256 digest.

use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};

/// How long a reset link stays valid.
pub const RESET_TOKEN_TTL_MINUTES: i64 = 10;

const RESET_TOKEN_BYTES: usize = 32;

pub struct ResetToken {
    /// Sent to the user
    pub plaintext: String,
    /// Persisted
    pub digest: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    pub fn generate() -> Self {
        Self::generate_at(Utc::now())
    }

    pub fn generate_at(now: DateTime<Utc>) -> Self {
        let mut bytes = [0u8; RESET_TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);

        let plaintext = hex::encode(bytes);
        let digest = hash_reset_token(&plaintext);

        Self {
            plaintext,
            digest,
            expires_at: now + Duration::minutes(RESET_TOKEN_TTL_MINUTES),
        }
    }
}

/// Hash a token using SHA-256
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}
