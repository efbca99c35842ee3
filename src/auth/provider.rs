//! OpenID Connect relying-party client
//!
//! [`OidcProvider`] wraps one discovered provider: it builds the
//! authorization redirect, exchanges authorization codes and verifies
//! identity tokens against the provider's published keys.
//!
//! [`ProviderSource`] hands out providers to request handlers. With caching
//! enabled the first successful discovery is reused until it is invalidated
//! or replaced by [`ProviderSource::refresh`]; a failed discovery is never
//! cached.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use jsonwebtoken::{Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use url::Url;

use super::claims::Claims;
use super::discovery::{fetch_provider_metadata, ProviderMetadata};
use super::error::AuthError;
use super::jwks::KeyCache;
use crate::config::AuthConfig;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Client registration used to talk to the provider
#[derive(Clone)]
pub struct ProviderSettings {
    pub issuer_url: String,
    pub client_id: String,
    pub client_secret: String,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub http_timeout: Duration,
    pub cache_discovery: bool,
}

impl std::fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("issuer_url", &self.issuer_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("redirect_url", &self.redirect_url)
            .field("scopes", &self.scopes)
            .field("http_timeout", &self.http_timeout)
            .field("cache_discovery", &self.cache_discovery)
            .finish()
    }
}

impl From<&AuthConfig> for ProviderSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            issuer_url: config.issuer_url.clone(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_url: config.redirect_url.clone(),
            scopes: config.scopes.clone(),
            http_timeout: Duration::from_secs(config.http_timeout_seconds),
            cache_discovery: config.cache_discovery,
        }
    }
}

// ---------------------------------------------------------------------------
// Token types
// ---------------------------------------------------------------------------

/// Successful token endpoint response
///
/// Fields outside RFC 6749 section 5.1, `id_token` among them, are kept in
/// [`TokenSet::extra`].
#[derive(Clone, Serialize, Deserialize)]
pub struct TokenSet {
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,

    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

impl TokenSet {
    /// Extension field from the token response
    pub fn extra(&self, name: &str) -> Option<&serde_json::Value> {
        self.extra.get(name)
    }

    /// Raw identity token, present only when the response carried it as a string
    pub fn id_token(&self) -> Option<&str> {
        self.extra("id_token").and_then(serde_json::Value::as_str)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("token_type", &self.token_type)
            .field("expires_in", &self.expires_in)
            .field("scope", &self.scope)
            .field("has_id_token", &self.id_token().is_some())
            .finish_non_exhaustive()
    }
}

/// Identity token whose signature, issuer, audience and expiry checked out
#[derive(Debug, Clone)]
pub struct VerifiedIdentityToken {
    pub header: Header,
    payload: serde_json::Value,
}

impl VerifiedIdentityToken {
    /// Decode the payload into claims
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::ClaimDecode`] when the payload is not a JSON object
    pub fn claims(&self) -> Result<Claims, AuthError> {
        Claims::from_json(self.payload.clone()).map_err(|e| AuthError::ClaimDecode(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Provider client
// ---------------------------------------------------------------------------

/// A discovered identity provider bound to this client's registration
pub struct OidcProvider {
    http: reqwest::Client,
    settings: ProviderSettings,
    metadata: ProviderMetadata,
    algorithms: Vec<Algorithm>,
    keys: KeyCache,
}

impl std::fmt::Debug for OidcProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OidcProvider")
            .field("issuer", &self.metadata.issuer)
            .field("algorithms", &self.algorithms)
            .finish_non_exhaustive()
    }
}

/// RSA algorithms usable with keys built from JWK modulus and exponent
fn rsa_algorithms(advertised: &[String]) -> Vec<Algorithm> {
    let algorithms: Vec<Algorithm> = advertised
        .iter()
        .filter_map(|name| Algorithm::from_str(name).ok())
        .filter(|alg| {
            matches!(
                alg,
                Algorithm::RS256
                    | Algorithm::RS384
                    | Algorithm::RS512
                    | Algorithm::PS256
                    | Algorithm::PS384
                    | Algorithm::PS512
            )
        })
        .collect();

    if algorithms.is_empty() {
        vec![Algorithm::RS256]
    } else {
        algorithms
    }
}

impl OidcProvider {
    /// Run discovery and bind the result to `settings`.
    ///
    /// # Errors
    ///
    /// [`AuthError::Configuration`] for an unusable local registration,
    /// [`AuthError::Discovery`] when the provider cannot be discovered.
    pub async fn discover(
        http: reqwest::Client,
        settings: ProviderSettings,
    ) -> Result<Self, AuthError> {
        if settings.client_id.is_empty() {
            return Err(AuthError::Configuration("client id is empty".to_string()));
        }
        Url::parse(&settings.redirect_url).map_err(|e| {
            AuthError::Configuration(format!(
                "invalid redirect URL '{}': {}",
                settings.redirect_url, e
            ))
        })?;

        let metadata = fetch_provider_metadata(&http, &settings.issuer_url).await?;
        Ok(Self::from_metadata(http, settings, metadata))
    }

    /// Bind already-fetched metadata without touching the network.
    pub fn from_metadata(
        http: reqwest::Client,
        settings: ProviderSettings,
        metadata: ProviderMetadata,
    ) -> Self {
        let algorithms = rsa_algorithms(&metadata.id_token_signing_alg_values_supported);
        let keys = KeyCache::new(http.clone(), metadata.jwks_uri.clone());
        Self {
            http,
            settings,
            metadata,
            algorithms,
            keys,
        }
    }

    pub fn metadata(&self) -> &ProviderMetadata {
        &self.metadata
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Authorization endpoint URL carrying the client registration and `state`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the advertised endpoint is not a URL
    pub fn authorization_url(&self, state: &str) -> Result<Url, AuthError> {
        let mut url = Url::parse(&self.metadata.authorization_endpoint).map_err(|e| {
            AuthError::Configuration(format!("invalid authorization endpoint URL: {}", e))
        })?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.settings.client_id)
            .append_pair("redirect_uri", &self.settings.redirect_url)
            .append_pair("scope", &self.settings.scopes.join(" "))
            .append_pair("state", state);

        Ok(url)
    }

    /// Exchange an authorization code at the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenExchange`] when the provider is unreachable,
    /// rejects the code, or answers with something other than a token response.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenSet, AuthError> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.settings.redirect_url.as_str()),
            ("client_id", self.settings.client_id.as_str()),
            ("client_secret", self.settings.client_secret.as_str()),
        ];

        let resp = self
            .http
            .post(&self.metadata.token_endpoint)
            .header(reqwest::header::ACCEPT, "application/json")
            .form(&params)
            .send()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("token request failed: {}", e)))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AuthError::TokenExchange(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        resp.json::<TokenSet>()
            .await
            .map_err(|e| AuthError::TokenExchange(format!("failed to parse token response: {}", e)))
    }

    /// Verify a raw identity token.
    ///
    /// The header algorithm must be one the provider advertises; the key is
    /// chosen by `kid`. Issuer, audience (this client id) and `exp` are
    /// enforced with no leeway.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenVerification`] for any failed check
    pub async fn verify_identity_token(
        &self,
        raw: &str,
    ) -> Result<VerifiedIdentityToken, AuthError> {
        let header = jsonwebtoken::decode_header(raw)
            .map_err(|e| AuthError::TokenVerification(format!("malformed token: {}", e)))?;

        if !self.algorithms.contains(&header.alg) {
            return Err(AuthError::TokenVerification(format!(
                "unexpected signing algorithm {:?}",
                header.alg
            )));
        }

        let mut validation = Validation::new(header.alg);
        validation.set_issuer(&[self.metadata.issuer.as_str()]);
        validation.set_audience(&[self.settings.client_id.as_str()]);
        validation.set_required_spec_claims(&["exp", "iss", "aud"]);
        validation.leeway = 0;

        let mut last_error = None;
        for candidate in self.keys.candidates(header.kid.as_deref()).await? {
            match jsonwebtoken::decode::<serde_json::Value>(raw, &candidate.key, &validation) {
                Ok(data) => {
                    return Ok(VerifiedIdentityToken {
                        header: data.header,
                        payload: data.claims,
                    })
                }
                Err(e) => last_error = Some(e),
            }
        }

        Err(AuthError::TokenVerification(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no candidate signing key".to_string()),
        ))
    }
}

// ---------------------------------------------------------------------------
// Provider source
// ---------------------------------------------------------------------------

/// Shared access to the discovered provider
pub struct ProviderSource {
    http: reqwest::Client,
    settings: ProviderSettings,
    cached: RwLock<Option<Arc<OidcProvider>>>,
}

impl ProviderSource {
    /// Build the shared HTTP client. No network traffic happens here.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Configuration`] if the HTTP client cannot be built
    pub fn new(settings: ProviderSettings) -> Result<Self, AuthError> {
        let http = reqwest::Client::builder()
            .timeout(settings.http_timeout)
            .connect_timeout(settings.http_timeout)
            .user_agent(concat!("locale-mgmt/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AuthError::Configuration(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            settings,
            cached: RwLock::new(None),
        })
    }

    pub fn settings(&self) -> &ProviderSettings {
        &self.settings
    }

    /// Current provider, discovering it on first use.
    ///
    /// # Errors
    ///
    /// Propagates the discovery failure; nothing is cached in that case.
    pub async fn get(&self) -> Result<Arc<OidcProvider>, AuthError> {
        if !self.settings.cache_discovery {
            return self.discover().await.map(Arc::new);
        }

        if let Some(provider) = self.cached.read().await.as_ref() {
            return Ok(Arc::clone(provider));
        }

        let mut slot = self.cached.write().await;
        if let Some(provider) = slot.as_ref() {
            return Ok(Arc::clone(provider));
        }
        let provider = Arc::new(self.discover().await?);
        *slot = Some(Arc::clone(&provider));
        Ok(provider)
    }

    /// Drop the cached provider; the next `get` rediscovers.
    pub async fn invalidate(&self) {
        tracing::info!(issuer = %self.settings.issuer_url, "Invalidating cached provider metadata");
        *self.cached.write().await = None;
    }

    /// Rediscover and replace the cached provider. On failure the previous
    /// provider stays in place.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        let provider = self.discover().await?;
        *self.cached.write().await = Some(Arc::new(provider));
        Ok(())
    }

    async fn discover(&self) -> Result<OidcProvider, AuthError> {
        OidcProvider::discover(self.http.clone(), self.settings.clone()).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
