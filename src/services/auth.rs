//! Password sign-in and admin bootstrap.
//!
//! Passwords are stored as argon2id PHC strings, so the salt and cost
//! parameters travel with each hash.

use argon2::Argon2;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use axum::http::StatusCode;
use rand::Rng;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::ErrorCode;

pub const MIN_PASSWORD_LEN: usize = 8;

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,
    #[error("password must be at least {MIN_PASSWORD_LEN} characters")]
    WeakPassword,
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ErrorCode for AuthError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "E_INVALID_CREDENTIALS",
            Self::WeakPassword => "E_WEAK_PASSWORD",
            Self::Hash(_) => "E_INTERNAL",
            Self::Database(_) => "E_DATABASE",
        }
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::InvalidCredentials => StatusCode::UNAUTHORIZED,
            Self::WeakPassword => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Hash(_) | Self::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn db_error(&self) -> Option<&sqlx::Error> {
        match self {
            Self::Database(e) => Some(e),
            _ => None,
        }
    }
}

/// Hash with a fresh random salt into a PHC string.
///
/// # Errors
///
/// `Hash` if argon2 rejects the input.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt_bytes: [u8; 16] = rand::rng().random();
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AuthError::Hash(e.to_string()))?;
    Ok(hash.to_string())
}

/// `false` for a wrong password or an unparseable stored hash.
#[must_use]
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    PasswordHash::new(stored_hash)
        .is_ok_and(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok())
}

/// Check an e-mail/password pair. Returns the user id on success.
///
/// # Errors
///
/// `InvalidCredentials` for an unknown e-mail or wrong password.
pub async fn sign_in(pool: &PgPool, email: &str, password: &str) -> Result<Uuid, AuthError> {
    let normalized = email.trim().to_ascii_lowercase();
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE email = $1")
        .bind(&normalized)
        .fetch_optional(pool)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    let hash: String = row.get("password_hash");
    if !verify_password(password, &hash) {
        return Err(AuthError::InvalidCredentials);
    }
    Ok(row.get("id"))
}

/// Ask the database whether a user holds the admin role.
pub async fn is_admin(pool: &PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT is_user_admin($1)")
        .bind(user_id)
        .fetch_one(pool)
        .await
}

/// Create or refresh an admin account. Used for the startup bootstrap.
///
/// # Errors
///
/// Returns `WeakPassword` for short passwords, or a database error.
pub async fn upsert_admin(pool: &PgPool, email: &str, password: &str) -> Result<Uuid, AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::WeakPassword);
    }
    let normalized = email.trim().to_ascii_lowercase();
    let hash = hash_password(password)?;

    let mut tx = pool.begin().await?;
    let user_id: Uuid = sqlx::query_scalar(
        r"INSERT INTO users (email, password_hash)
          VALUES ($1, $2)
          ON CONFLICT (email) DO UPDATE
          SET password_hash = EXCLUDED.password_hash,
              updated_at = now()
          RETURNING id",
    )
    .bind(&normalized)
    .bind(&hash)
    .fetch_one(tx.as_mut())
    .await?;

    sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, 'admin') ON CONFLICT (user_id, role) DO NOTHING")
        .bind(user_id)
        .execute(tx.as_mut())
        .await?;
    tx.commit().await?;

    Ok(user_id)
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
