//! Password hashing
//! Mission: bcrypt hashing and timing-safe verification

use anyhow::{Context, Result};
use bcrypt::{hash, verify};
use std::sync::OnceLock;

/// Work factor used for stored passwords.
pub const PASSWORD_COST: u32 = 12;

static DUMMY_HASH: OnceLock<String> = OnceLock::new();

pub fn hash_password(password: &str, cost: u32) -> Result<String> {
    hash(password, cost).context("Failed to hash password")
}

pub fn verify_password(candidate: &str, password_hash: &str) -> Result<bool> {
    verify(candidate, password_hash).context("Failed to verify password")
}

/// Burn one bcrypt verification so unknown accounts cost the same as wrong passwords.
pub fn verify_against_dummy(candidate: &str) {
    let dummy = DUMMY_HASH.get_or_init(|| {
        hash("movie-catalog-dummy-password", PASSWORD_COST).unwrap_or_default()
    });
    if !dummy.is_empty() {
        let _ = verify(candidate, dummy);
    }
}
