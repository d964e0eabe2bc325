//! User Storage
//! Mission: Persist credentials, profile data and reset-token state in SQLite
//!
//! Deactivated accounts are invisible to every lookup.

use crate::auth::models::{NewUser, User, UserRole};
use crate::auth::password::{hash_password, PASSWORD_COST};
use crate::error::unique_violation;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SCHEMA_SQL: &str = r#"
PRAGMA journal_mode = WAL;
PRAGMA synchronous = NORMAL;

CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    email TEXT UNIQUE NOT NULL,
    photo TEXT,
    role TEXT NOT NULL DEFAULT 'user',
    password_hash TEXT NOT NULL,
    password_changed_at INTEGER,
    password_reset_token TEXT,
    password_reset_expires INTEGER,
    active INTEGER NOT NULL DEFAULT 1,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_users_reset_token
    ON users(password_reset_token) WHERE password_reset_token IS NOT NULL;
"#;

const USER_COLUMNS: &str = "id, name, email, photo, role, password_hash, password_changed_at,
     password_reset_token, password_reset_expires, active, created_at";

/// User storage with SQLite backend
pub struct UserStore {
    conn: Arc<Mutex<Connection>>,
    hash_cost: u32,
}

impl UserStore {
    /// Open (or create) the user database
    pub fn new(db_path: &str) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user database at {}", db_path))?;
        Self::from_connection(conn, PASSWORD_COST)
    }

    /// Lower bcrypt cost, for tests and tooling only
    pub fn with_hash_cost(db_path: &str, hash_cost: u32) -> Result<Self> {
        let conn = Connection::open(db_path)
            .with_context(|| format!("Failed to open user database at {}", db_path))?;
        Self::from_connection(conn, hash_cost)
    }

    fn from_connection(conn: Connection, hash_cost: u32) -> Result<Self> {
        conn.execute_batch(SCHEMA_SQL)
            .context("Failed to initialize user schema")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            hash_cost,
        })
    }

    /// Create a new user, hashing the password
    pub fn create_user(&self, new_user: &NewUser) -> Result<User> {
        let password_hash = hash_password(&new_user.password, self.hash_cost)?;

        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.clone(),
            email: new_user.email.clone(),
            photo: new_user.photo.clone(),
            role: new_user.role,
            password_hash,
            password_changed_at: None,
            password_reset_token: None,
            password_reset_expires: None,
            active: true,
            created_at: Utc::now(),
        };

        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO users (id, name, email, photo, role, password_hash, active, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 1, ?7)",
            params![
                user.id.to_string(),
                user.name,
                user.email,
                user.photo,
                user.role.as_str(),
                user.password_hash,
                user.created_at.timestamp_millis(),
            ],
        )
        .map_err(|e| unique_violation(e, "email", &user.email))?;

        info!(user_id = %user.id, role = user.role.as_str(), "✅ Created user");

        Ok(user)
    }

    pub fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1 AND active = 1"),
            params![email],
            row_to_user,
        )
        .optional()
        .context("Failed to look up user by email")
    }

    pub fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1 AND active = 1"),
            params![id.to_string()],
            row_to_user,
        )
        .optional()
        .context("Failed to look up user by id")
    }

    /// Find the active user holding an unexpired reset token with this digest
    pub fn find_by_reset_token(&self, digest: &str, now: DateTime<Utc>) -> Result<Option<User>> {
        let conn = self.conn.lock();
        conn.query_row(
            &format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE password_reset_token = ?1
                   AND password_reset_expires >= ?2
                   AND active = 1"
            ),
            params![digest, now.timestamp_millis()],
            row_to_user,
        )
        .optional()
        .context("Failed to look up reset token")
    }

    pub fn set_reset_token(&self, id: &Uuid, digest: &str, expires: DateTime<Utc>) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET password_reset_token = ?1, password_reset_expires = ?2 WHERE id = ?3",
            params![digest, expires.timestamp_millis(), id.to_string()],
        )
        .context("Failed to store reset token")?;
        Ok(())
    }

    pub fn clear_reset_token(&self, id: &Uuid) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE users SET password_reset_token = NULL, password_reset_expires = NULL WHERE id = ?1",
            params![id.to_string()],
        )
        .context("Failed to clear reset token")?;
        Ok(())
    }

    /// Replace the password, stamp the change time and drop any pending reset token
    pub fn update_password(
        &self,
        id: &Uuid,
        new_password: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let password_hash = hash_password(new_password, self.hash_cost)?;

        {
            let conn = self.conn.lock();
            let rows = conn
                .execute(
                    "UPDATE users
                     SET password_hash = ?1,
                         password_changed_at = ?2,
                         password_reset_token = NULL,
                         password_reset_expires = NULL
                     WHERE id = ?3 AND active = 1",
                    params![password_hash, changed_at.timestamp_millis(), id.to_string()],
                )
                .context("Failed to update password")?;

            if rows == 0 {
                return Ok(None);
            }
        }

        info!(user_id = %id, "🔑 Password updated");
        self.find_by_id(id)
    }

    /// Set a new password through a reset token, consuming the token in the
    /// same statement. `None` when the token is unknown, expired or already used.
    pub fn consume_reset_token(
        &self,
        digest: &str,
        now: DateTime<Utc>,
        new_password: &str,
        changed_at: DateTime<Utc>,
    ) -> Result<Option<User>> {
        let password_hash = hash_password(new_password, self.hash_cost)?;

        let conn = self.conn.lock();
        let user = conn
            .query_row(
                &format!(
                    "UPDATE users
                     SET password_hash = ?1,
                         password_changed_at = ?2,
                         password_reset_token = NULL,
                         password_reset_expires = NULL
                     WHERE password_reset_token = ?3
                       AND password_reset_expires >= ?4
                       AND active = 1
                     RETURNING {USER_COLUMNS}"
                ),
                params![
                    password_hash,
                    changed_at.timestamp_millis(),
                    digest,
                    now.timestamp_millis()
                ],
                row_to_user,
            )
            .optional()
            .context("Failed to consume reset token")?;

        if let Some(user) = &user {
            info!(user_id = %user.id, "🔑 Password reset");
        }
        Ok(user)
    }

    /// Update name and/or email; `None` leaves a field untouched
    pub fn update_profile(
        &self,
        id: &Uuid,
        name: Option<&str>,
        email: Option<&str>,
    ) -> Result<Option<User>> {
        {
            let conn = self.conn.lock();
            let rows = conn
                .execute(
                    "UPDATE users
                     SET name = COALESCE(?1, name),
                         email = COALESCE(?2, email)
                     WHERE id = ?3 AND active = 1",
                    params![name, email, id.to_string()],
                )
                .map_err(|e| unique_violation(e, "email", email.unwrap_or_default()))?;

            if rows == 0 {
                return Ok(None);
            }
        }

        self.find_by_id(id)
    }

    /// Soft delete
    pub fn deactivate(&self, id: &Uuid) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET active = 0 WHERE id = ?1 AND active = 1",
                params![id.to_string()],
            )
            .context("Failed to deactivate user")?;

        if rows > 0 {
            info!(user_id = %id, "🗑️  User deactivated");
        }
        Ok(rows > 0)
    }

    pub fn set_role(&self, id: &Uuid, role: UserRole) -> Result<bool> {
        let conn = self.conn.lock();
        let rows = conn
            .execute(
                "UPDATE users SET role = ?1 WHERE id = ?2",
                params![role.as_str(), id.to_string()],
            )
            .context("Failed to update role")?;
        Ok(rows > 0)
    }

    pub fn list_active(&self) -> Result<Vec<User>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE active = 1 ORDER BY created_at"
        ))?;

        let users = stmt
            .query_map([], row_to_user)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(users)
    }
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<User> {
    let id: String = row.get(0)?;
    let role: String = row.get(4)?;

    Ok(User {
        id: Uuid::parse_str(&id).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
        })?,
        name: row.get(1)?,
        email: row.get(2)?,
        photo: row.get(3)?,
        role: role.parse().unwrap_or_default(),
        password_hash: row.get(5)?,
        password_changed_at: millis_to_datetime(row.get(6)?),
        password_reset_token: row.get(7)?,
        password_reset_expires: millis_to_datetime(row.get(8)?),
        active: row.get::<_, i64>(9)? != 0,
        created_at: millis_to_datetime(row.get(10)?).unwrap_or_default(),
    })
}

fn millis_to_datetime(millis: Option<i64>) -> Option<DateTime<Utc>> {
    millis.and_then(DateTime::from_timestamp_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::error::DuplicateKey;
    use chrono::Duration;
    use tempfile::NamedTempFile;

    fn create_test_store() -> (UserStore, NamedTempFile) {
        let temp_file = NamedTempFile::new().unwrap();
        let db_path = temp_file.path().to_str().unwrap();
        let store = UserStore::with_hash_cost(db_path, 4).unwrap();
        (store, temp_file)
    }

    fn new_user(email: &str) -> NewUser {
        NewUser {
            name: "Ada Lovelace".to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            photo: None,
            role: UserRole::User,
        }
    }

    #[test]
    fn test_create_and_retrieve_user() {
        let (store, _temp) = create_test_store();

        let created = store.create_user(&new_user("ada@example.com")).unwrap();
        assert_ne!(created.password_hash, "password123");

        let by_email = store.find_by_email("ada@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, created.id);
        assert_eq!(by_email.role, UserRole::User);
        assert!(verify_password("password123", &by_email.password_hash).unwrap());

        let by_id = store.find_by_id(&created.id).unwrap().unwrap();
        assert_eq!(by_id.email, "ada@example.com");
    }

    #[test]
    fn test_duplicate_email_rejected() {
        let (store, _temp) = create_test_store();

        store.create_user(&new_user("ada@example.com")).unwrap();
        let err = store.create_user(&new_user("ada@example.com")).unwrap_err();
        assert!(err.downcast_ref::<DuplicateKey>().is_some());
    }

    #[test]
    fn test_reset_token_lifecycle() {
        let (store, _temp) = create_test_store();
        let user = store.create_user(&new_user("ada@example.com")).unwrap();
        let now = Utc::now();

        store
            .set_reset_token(&user.id, "digest-1", now + Duration::minutes(10))
            .unwrap();
        assert!(store.find_by_reset_token("digest-1", now).unwrap().is_some());
        assert!(store.find_by_reset_token("digest-2", now).unwrap().is_none());

        // Expired
        assert!(store
            .find_by_reset_token("digest-1", now + Duration::minutes(11))
            .unwrap()
            .is_none());

        store.clear_reset_token(&user.id).unwrap();
        assert!(store.find_by_reset_token("digest-1", now).unwrap().is_none());
    }

    #[test]
    fn test_update_password_clears_reset_state() {
        let (store, _temp) = create_test_store();
        let user = store.create_user(&new_user("ada@example.com")).unwrap();
        let now = Utc::now();

        store
            .set_reset_token(&user.id, "digest-1", now + Duration::minutes(10))
            .unwrap();

        let updated = store
            .update_password(&user.id, "new-password-456", now)
            .unwrap()
            .unwrap();

        assert!(verify_password("new-password-456", &updated.password_hash).unwrap());
        assert!(updated.password_reset_token.is_none());
        assert!(updated.password_reset_expires.is_none());
        assert_eq!(
            updated.password_changed_at.unwrap().timestamp_millis(),
            now.timestamp_millis()
        );
    }

    #[test]
    fn test_reset_token_is_single_use() {
        let (store, _temp) = create_test_store();
        let user = store.create_user(&new_user("ada@example.com")).unwrap();
        let now = Utc::now();

        store
            .set_reset_token(&user.id, "digest-1", now + Duration::minutes(10))
            .unwrap();

        // Two requests with the same link both get past the lookup
        assert!(store.find_by_reset_token("digest-1", now).unwrap().is_some());
        assert!(store.find_by_reset_token("digest-1", now).unwrap().is_some());

        let first = store
            .consume_reset_token("digest-1", now, "first-password-1", now)
            .unwrap();
        let second = store
            .consume_reset_token("digest-1", now, "second-password-2", now)
            .unwrap();

        let first = first.unwrap();
        assert_eq!(first.id, user.id);
        assert!(first.password_reset_token.is_none());
        assert!(second.is_none());

        let stored = store.find_by_id(&user.id).unwrap().unwrap();
        assert!(verify_password("first-password-1", &stored.password_hash).unwrap());
    }

    #[test]
    fn test_expired_reset_token_cannot_be_consumed() {
        let (store, _temp) = create_test_store();
        let user = store.create_user(&new_user("ada@example.com")).unwrap();
        let now = Utc::now();

        store
            .set_reset_token(&user.id, "digest-1", now + Duration::minutes(10))
            .unwrap();

        let later = now + Duration::minutes(11);
        assert!(store
            .consume_reset_token("digest-1", later, "new-password-456", later)
            .unwrap()
            .is_none());
        let stored = store.find_by_id(&user.id).unwrap().unwrap();
        assert!(verify_password("password123", &stored.password_hash).unwrap());
    }

    #[test]
    fn test_update_profile() {
        let (store, _temp) = create_test_store();
        let user = store.create_user(&new_user("ada@example.com")).unwrap();
        store.create_user(&new_user("grace@example.com")).unwrap();

        let updated = store
            .update_profile(&user.id, Some("Countess"), None)
            .unwrap()
            .unwrap();
        assert_eq!(updated.name, "Countess");
        assert_eq!(updated.email, "ada@example.com");

        let err = store
            .update_profile(&user.id, None, Some("grace@example.com"))
            .unwrap_err();
        assert!(err.downcast_ref::<DuplicateKey>().is_some());
    }

    #[test]
    fn test_deactivated_user_is_invisible() {
        let (store, _temp) = create_test_store();
        let user = store.create_user(&new_user("ada@example.com")).unwrap();
        store.create_user(&new_user("grace@example.com")).unwrap();

        assert!(store.deactivate(&user.id).unwrap());
        assert!(!store.deactivate(&user.id).unwrap());

        assert!(store.find_by_id(&user.id).unwrap().is_none());
        assert!(store.find_by_email("ada@example.com").unwrap().is_none());
        assert_eq!(store.list_active().unwrap().len(), 1);
    }

    #[test]
    fn test_set_role() {
        let (store, _temp) = create_test_store();
        let user = store.create_user(&new_user("ada@example.com")).unwrap();

        assert!(store.set_role(&user.id, UserRole::Admin).unwrap());
        let user = store.find_by_id(&user.id).unwrap().unwrap();
        assert_eq!(user.role, UserRole::Admin);
    }
}
