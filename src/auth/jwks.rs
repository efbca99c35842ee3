//! Provider signing keys
//!
//! Keys are fetched lazily from the provider's `jwks_uri` on first use and
//! cached. A token signed with a key id the cache has not seen triggers one
//! refetch, which is how provider key rotation is picked up.

use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use tokio::sync::RwLock;

use super::error::AuthError;

#[derive(Debug, Deserialize)]
struct JwkSetDocument {
    #[serde(default)]
    keys: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct RawJwk {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default, rename = "use")]
    key_use: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

/// RSA verification key taken from the provider's key set
#[derive(Clone)]
pub struct SigningKey {
    pub kid: Option<String>,
    pub key: DecodingKey,
}

impl std::fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SigningKey").field("kid", &self.kid).finish()
    }
}

/// Parse a JWKS document, keeping RSA signature keys only.
///
/// Entries with another key type, an encryption `use`, or unusable modulus
/// and exponent are skipped rather than failing the whole set.
pub fn parse_key_set(body: &[u8]) -> Result<Vec<SigningKey>, AuthError> {
    let document: JwkSetDocument = serde_json::from_slice(body)
        .map_err(|e| AuthError::TokenVerification(format!("malformed JWKS document: {}", e)))?;

    let mut keys = Vec::new();
    for entry in document.keys {
        let jwk: RawJwk = match serde_json::from_value(entry) {
            Ok(jwk) => jwk,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping unreadable JWK");
                continue;
            }
        };
        if jwk.kty != "RSA" || jwk.key_use.as_deref().is_some_and(|u| u != "sig") {
            continue;
        }
        let (Some(n), Some(e)) = (jwk.n.as_deref(), jwk.e.as_deref()) else {
            continue;
        };
        match DecodingKey::from_rsa_components(n, e) {
            Ok(key) => keys.push(SigningKey { kid: jwk.kid, key }),
            Err(err) => tracing::debug!(kid = ?jwk.kid, error = %err, "Skipping invalid RSA JWK"),
        }
    }
    Ok(keys)
}

/// Cached key set for one provider
pub struct KeyCache {
    http: reqwest::Client,
    jwks_uri: String,
    keys: RwLock<Option<Vec<SigningKey>>>,
}

impl KeyCache {
    pub fn new(http: reqwest::Client, jwks_uri: impl Into<String>) -> Self {
        Self {
            http,
            jwks_uri: jwks_uri.into(),
            keys: RwLock::new(None),
        }
    }

    /// Keys that may have signed a token with the given `kid`.
    ///
    /// With a `kid` only the matching key is returned. Without one every
    /// cached key is a candidate.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::TokenVerification`] if the key set cannot be
    /// fetched or holds no matching key after a refetch.
    pub async fn candidates(&self, kid: Option<&str>) -> Result<Vec<SigningKey>, AuthError> {
        if let Some(found) = self.lookup(kid).await {
            return Ok(found);
        }

        self.refresh().await?;

        self.lookup(kid).await.ok_or_else(|| {
            AuthError::TokenVerification(match kid {
                Some(kid) => format!("no signing key with kid '{}' in {}", kid, self.jwks_uri),
                None => format!("no signing keys in {}", self.jwks_uri),
            })
        })
    }

    async fn lookup(&self, kid: Option<&str>) -> Option<Vec<SigningKey>> {
        let guard = self.keys.read().await;
        let keys = guard.as_ref()?;
        let found: Vec<SigningKey> = match kid {
            Some(kid) => keys
                .iter()
                .filter(|key| key.kid.as_deref() == Some(kid))
                .cloned()
                .collect(),
            None => keys.clone(),
        };
        (!found.is_empty()).then_some(found)
    }

    /// Refetch the key set, replacing the cache on success.
    pub async fn refresh(&self) -> Result<(), AuthError> {
        tracing::debug!(jwks_uri = %self.jwks_uri, "Fetching provider signing keys");

        let resp = self
            .http
            .get(&self.jwks_uri)
            .send()
            .await
            .map_err(|e| AuthError::TokenVerification(format!("JWKS fetch failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(AuthError::TokenVerification(format!(
                "JWKS endpoint {} returned {}",
                self.jwks_uri,
                resp.status()
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| AuthError::TokenVerification(format!("JWKS read failed: {}", e)))?;
        let keys = parse_key_set(&body)?;

        tracing::debug!(count = keys.len(), "Cached provider signing keys");
        *self.keys.write().await = Some(keys);
        Ok(())
    }
}
