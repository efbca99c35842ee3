//! Error types for locale-mgmt
//!
//! Application-level errors live here. Errors raised while handling the
//! browser login flow have their own taxonomy in [`crate::auth::AuthError`]
//! because each of them maps onto an HTTP response.

use thiserror::Error;

/// Main error type for locale-mgmt operations
///
/// Covers configuration loading and validation, locale storage, and
/// provider failures seen outside a browser request.
#[derive(Error, Debug)]
pub enum LocaleMgmtError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Locale storage errors (SQLite open, schema, queries)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Request payload rejected before reaching storage
    #[error("Validation error: {0}")]
    Validation(String),

    /// Identity provider unreachable or misbehaving outside of a request
    #[error("Provider error: {0}")]
    Provider(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

/// Result type alias for locale-mgmt operations
///
/// Uses `anyhow::Result` so callers can attach context as errors travel up
/// to the CLI.
pub type Result<T> = anyhow::Result<T>;
