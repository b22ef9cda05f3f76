//! Typed errors for the non-HTTP layers.
//!
//! Handler-facing HTTP errors live in `api::ApiError`; these enums cover
//! password policy, image handling, and shopping-list export failures.

use thiserror::Error;

/// Password policy violations, mirrored in registration and
/// `set_password` responses.
#[derive(Debug, Error, PartialEq)]
pub enum PasswordError {
    #[error("This password is too short. It must contain at least {min} characters.")]
    TooShort { min: usize },

    #[error("This password is entirely numeric.")]
    EntirelyNumeric,
}

/// Failures while decoding or storing an uploaded recipe image.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Invalid image payload: {0}")]
    InvalidPayload(String),

    #[error("Unsupported image type: {0}")]
    UnsupportedType(String),

    #[error("Failed to store image: {0}")]
    Io(#[from] std::io::Error),
}

/// Failures while rendering the shopping-list export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Failed to render PDF: {0}")]
    Pdf(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
