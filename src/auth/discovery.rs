//! OpenID Connect discovery
//!
//! Resolves the provider's endpoints from
//! `<issuer>/.well-known/openid-configuration` (OpenID Connect Discovery 1.0
//! section 4) and checks that the document describes the issuer it was
//! fetched for.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use url::Url;

use super::error::AuthError;

/// Path appended to the issuer to locate the discovery document
pub const DISCOVERY_PATH: &str = "/.well-known/openid-configuration";

// ---------------------------------------------------------------------------
// Provider metadata
// ---------------------------------------------------------------------------

/// Subset of the OpenID Provider Metadata the gateway relies on.
///
/// Unrecognised fields are kept in [`ProviderMetadata::extra`].
///
/// # Examples
///
/// ```
/// use locale_mgmt::auth::discovery::ProviderMetadata;
///
/// let json = r#"{
///     "issuer": "https://tenant.example.com/",
///     "authorization_endpoint": "https://tenant.example.com/authorize",
///     "token_endpoint": "https://tenant.example.com/oauth/token",
///     "jwks_uri": "https://tenant.example.com/.well-known/jwks.json"
/// }"#;
///
/// let meta: ProviderMetadata = serde_json::from_str(json).unwrap();
/// assert_eq!(meta.token_endpoint, "https://tenant.example.com/oauth/token");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderMetadata {
    /// Issuer identifier; must match the configured issuer.
    pub issuer: String,

    /// Authorization endpoint the browser is redirected to.
    pub authorization_endpoint: String,

    /// Token endpoint for the code exchange.
    pub token_endpoint: String,

    /// Location of the provider's signing keys.
    pub jwks_uri: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userinfo_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_session_endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub scopes_supported: Vec<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub response_types_supported: Vec<String>,

    /// Signing algorithms for identity tokens; RS256 when absent.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub id_token_signing_alg_values_supported: Vec<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl ProviderMetadata {
    fn check_required(&self) -> Result<(), AuthError> {
        let required = [
            ("issuer", &self.issuer),
            ("authorization_endpoint", &self.authorization_endpoint),
            ("token_endpoint", &self.token_endpoint),
            ("jwks_uri", &self.jwks_uri),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AuthError::Discovery(format!(
                    "discovery document is missing {}",
                    name
                )));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Fetch
// ---------------------------------------------------------------------------

/// Builds the discovery URL for an issuer.
///
/// A trailing `/` on the issuer is ignored so that both
/// `https://idp.example.com` and `https://idp.example.com/` resolve to
/// `https://idp.example.com/.well-known/openid-configuration`.
pub fn discovery_url(issuer: &str) -> Result<Url, AuthError> {
    let base = issuer.trim_end_matches('/');
    Url::parse(&format!("{}{}", base, DISCOVERY_PATH))
        .map_err(|e| AuthError::Configuration(format!("invalid issuer URL '{}': {}", issuer, e)))
}

/// Compares issuers ignoring a trailing `/`.
pub fn issuer_matches(expected: &str, actual: &str) -> bool {
    expected.trim_end_matches('/') == actual.trim_end_matches('/')
}

/// Fetches and validates the discovery document for `issuer`.
///
/// # Errors
///
/// Returns [`AuthError::Configuration`] if the issuer is not a URL, and
/// [`AuthError::Discovery`] if the document cannot be fetched or parsed,
/// lacks a mandatory endpoint, or names a different issuer.
///
/// # Examples
///
/// ```no_run
/// use locale_mgmt::auth::discovery::fetch_provider_metadata;
///
/// # async fn example() -> Result<(), locale_mgmt::auth::AuthError> {
/// let http = reqwest::Client::new();
/// let meta = fetch_provider_metadata(&http, "https://tenant.example.com/").await?;
/// println!("token endpoint: {}", meta.token_endpoint);
/// # Ok(())
/// # }
/// ```
pub async fn fetch_provider_metadata(
    http: &reqwest::Client,
    issuer: &str,
) -> Result<ProviderMetadata, AuthError> {
    let url = discovery_url(issuer)?;
    tracing::debug!(url = %url, "Fetching provider discovery document");

    let resp = http
        .get(url.clone())
        .header(reqwest::header::ACCEPT, "application/json")
        .send()
        .await
        .map_err(|e| AuthError::Discovery(format!("discovery request to {} failed: {}", url, e)))?;

    if !resp.status().is_success() {
        return Err(AuthError::Discovery(format!(
            "discovery endpoint {} returned {}",
            url,
            resp.status()
        )));
    }

    let meta: ProviderMetadata = resp
        .json()
        .await
        .map_err(|e| AuthError::Discovery(format!("failed to parse discovery document: {}", e)))?;

    meta.check_required()?;

    if !issuer_matches(issuer, &meta.issuer) {
        return Err(AuthError::Discovery(format!(
            "issuer did not match the issuer returned by provider, expected \"{}\" got \"{}\"",
            issuer, meta.issuer
        )));
    }

    tracing::info!(issuer = %meta.issuer, "Discovered identity provider");
    Ok(meta)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
