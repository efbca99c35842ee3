//! Failures of the browser login flow
//!
//! Every variant maps onto an HTTP response. The full cause is logged; the
//! response body only carries a fixed category message so that provider
//! internals and token material never reach the browser.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Error raised by the login, callback, logout and session plumbing
#[derive(Error, Debug)]
pub enum AuthError {
    /// Discovery document unreachable, malformed, or for a different issuer
    #[error("Provider discovery failed: {0}")]
    Discovery(String),

    /// Local client configuration unusable
    #[error("Provider configuration error: {0}")]
    Configuration(String),

    /// Session could not be loaded
    #[error("Session error: {0}")]
    Session(String),

    /// Session could not be written back
    #[error("Failed to persist session: {0}")]
    SessionPersist(String),

    /// Callback state does not match the value stored at login
    #[error("Invalid state parameter")]
    InvalidState,

    /// Provider refused the authorization code
    #[error("Failed to exchange authorization code: {0}")]
    TokenExchange(String),

    /// Token response carried no `id_token`
    #[error("No id_token field in token response")]
    MissingIdentityToken,

    /// Signature, issuer, audience or expiry check failed
    #[error("Failed to verify identity token: {0}")]
    TokenVerification(String),

    /// Verified payload could not be decoded into claims
    #[error("Failed to decode identity token claims: {0}")]
    ClaimDecode(String),

    /// Logout URL could not be assembled
    #[error("Failed to build URL: {0}")]
    UrlConstruction(String),
}

impl AuthError {
    /// HTTP status for this failure
    pub fn status_code(&self) -> StatusCode {
        match self {
            AuthError::TokenExchange(_) => StatusCode::UNAUTHORIZED,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message shown to the browser
    pub fn public_message(&self) -> &'static str {
        match self {
            AuthError::Discovery(_) => "Identity provider is unavailable",
            AuthError::Configuration(_) => "Identity provider client is misconfigured",
            AuthError::Session(_) => "Failed to load session",
            AuthError::SessionPersist(_) => "Failed to save session",
            AuthError::InvalidState => "Invalid state parameter",
            AuthError::TokenExchange(_) => "Failed to exchange an authorization code for a token",
            AuthError::MissingIdentityToken => "No id_token field in oauth2 token",
            AuthError::TokenVerification(_) => "Failed to verify ID Token",
            AuthError::ClaimDecode(_) => "Failed to read identity claims",
            AuthError::UrlConstruction(_) => "Failed to build redirect URL",
        }
    }
}

/// JSON error body, `{"Message": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMessage {
    #[serde(rename = "Message")]
    pub message: String,
}

impl ErrorMessage {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        tracing::error!(status = %status.as_u16(), error = %self, "Authentication request failed");
        (status, Json(ErrorMessage::new(self.public_message()))).into_response()
    }
}
