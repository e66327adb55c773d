//! Core error types for `Portico`.

use thiserror::Error;

/// Core error type for `Portico` model operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A credential field was missing or malformed.
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// A base URL could not be used.
    #[error("Invalid base URL: {0}")]
    InvalidBaseUrl(String),

    /// Invalid input data.
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
