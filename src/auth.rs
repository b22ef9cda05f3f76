//! Password hashing, password policy, and bearer-token helpers.
//!
//! Passwords are stored as `sha256$<salt>$<digest>` with a random
//! per-user salt. Tokens are opaque uuid-v4 strings kept in the
//! `auth_tokens` table and presented as `Authorization: Token <key>`.

use axum::http::HeaderMap;
use axum::http::header::AUTHORIZATION;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::errors::PasswordError;

pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Hash a password with a fresh random salt.
pub fn hash_password(password: &str) -> String {
    let salt: [u8; 16] = rand::random();
    hash_with_salt(password, &hex::encode(salt))
}

fn hash_with_salt(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("sha256${}${}", salt, hex::encode(hasher.finalize()))
}

/// Check a candidate password against a stored `sha256$salt$digest` hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let mut parts = stored.split('$');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("sha256"), Some(salt), Some(_digest)) => hash_with_salt(password, salt) == stored,
        _ => false,
    }
}

/// Password policy applied at registration and `set_password`: minimum
/// length and not entirely numeric.
pub fn validate_password(password: &str) -> Result<(), PasswordError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(PasswordError::TooShort { min: MIN_PASSWORD_LENGTH });
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(PasswordError::EntirelyNumeric);
    }
    Ok(())
}

/// Mint a new opaque token key.
pub fn new_token() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Pull the token key out of an `Authorization: Token <key>` header.
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let key = value.strip_prefix("Token ")?.trim();
    if key.is_empty() { None } else { Some(key.to_string()) }
}
