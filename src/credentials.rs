//! Users, password hashes and bearer tokens.
//!
//! Passwords are stored as argon2id PHC strings (`$argon2id$v=19$...`); tokens are opaque 40-char
//! hex keys with at most one live key per user.

use crate::db::{user_from_row, Database};
use crate::error::{ApiError, ApiResult};
use crate::models::{Role, User, UserId};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use chrono::Utc;
use log::{debug, info};
use rusqlite::{params, ErrorCode, OptionalExtension};
use uuid::Uuid;

pub const PASSWORD_MIN_LEN: usize = 8;
const INVALID_CREDENTIALS: &str = "Unable to log in with provided credentials.";

pub fn hash_password(password: &str) -> ApiResult<String> {
    // 16 random bytes from a v4 uuid make the salt
    let salt = SaltString::encode_b64(Uuid::new_v4().as_bytes())
        .map_err(|e| ApiError::Internal(format!("password salt: {}", e)))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| ApiError::Internal(format!("password hash: {}", e)))?;
    Ok(hash.to_string())
}

/// A stored value that is not a valid PHC string never matches.
pub fn verify_password(password: &str, stored: &str) -> bool {
    match PasswordHash::new(stored) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

fn new_token_key() -> String {
    // 32 hex chars from the uuid plus 8 more from a second one
    let mut key = Uuid::new_v4().simple().to_string();
    key.push_str(&Uuid::new_v4().simple().to_string()[..8]);
    key
}

impl Database {
    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password: &str,
        role: Role,
    ) -> ApiResult<User> {
        let password_hash = hash_password(password)?;
        let conn = self.conn.lock().await;
        let now = Utc::now();
        let inserted = conn.execute(
            "INSERT INTO users (username, email, password_hash, is_staff, date_joined)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![username, email, password_hash, role.is_staff(), now],
        );
        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                return Err(ApiError::field(
                    "username",
                    "A user with that username already exists.",
                ));
            }
            Err(e) => return Err(e.into()),
        }
        let id = conn.last_insert_rowid();
        info!("[AUTH] Created user {} ({:?})", username, role);
        Ok(User {
            id,
            username: username.to_string(),
            email: email.to_string(),
            role,
            date_joined: now,
        })
    }

    pub async fn username_taken(&self, username: &str) -> ApiResult<bool> {
        let conn = self.conn.lock().await;
        Ok(conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE username = ?)",
            [username],
            |row| row.get(0),
        )?)
    }

    pub async fn get_user(&self, id: UserId) -> ApiResult<User> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "SELECT u.id, u.username, u.email, u.is_staff, u.date_joined FROM users u WHERE u.id = ?",
            [id],
            |row| user_from_row(row, 0),
        )
        .optional()?
        .ok_or(ApiError::NotFound)
    }

    /// Unknown username and wrong password fail identically.
    pub async fn verify_credentials(&self, username: &str, password: &str) -> ApiResult<User> {
        let conn = self.conn.lock().await;
        let found = conn
            .query_row(
                "SELECT u.id, u.username, u.email, u.is_staff, u.date_joined, u.password_hash
                 FROM users u WHERE u.username = ?",
                [username],
                |row| Ok((user_from_row(row, 0)?, row.get::<_, String>(5)?)),
            )
            .optional()?;
        match found {
            Some((user, stored)) if verify_password(password, &stored) => Ok(user),
            _ => {
                debug!("[AUTH] Rejected credentials for {}", username);
                Err(ApiError::Authentication(INVALID_CREDENTIALS.into()))
            }
        }
    }

    /// Returns the user's live token, creating one if none exists.
    pub async fn get_or_create_token(&self, user: UserId) -> ApiResult<String> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let existing: Option<String> = tx
            .query_row("SELECT key FROM auth_tokens WHERE user_id = ?", [user], |row| {
                row.get(0)
            })
            .optional()?;
        let key = match existing {
            Some(key) => key,
            None => {
                let key = new_token_key();
                tx.execute(
                    "INSERT INTO auth_tokens (key, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![key, user, Utc::now()],
                )?;
                debug!("[AUTH] Issued token for user {}", user);
                key
            }
        };
        tx.commit()?;
        Ok(key)
    }

    /// Fails when there is no token left to revoke.
    pub async fn revoke_token(&self, user: UserId) -> ApiResult<()> {
        let conn = self.conn.lock().await;
        let deleted = conn.execute("DELETE FROM auth_tokens WHERE user_id = ?", [user])?;
        if deleted == 0 {
            return Err(ApiError::NotFound);
        }
        debug!("[AUTH] Revoked token for user {}", user);
        Ok(())
    }

    pub async fn user_for_token(&self, key: &str) -> ApiResult<Option<User>> {
        let conn = self.conn.lock().await;
        Ok(conn
            .query_row(
                "SELECT u.id, u.username, u.email, u.is_staff, u.date_joined
                 FROM auth_tokens t JOIN users u ON u.id = t.user_id
                 WHERE t.key = ?",
                [key],
                |row| user_from_row(row, 0),
            )
            .optional()?)
    }
}
