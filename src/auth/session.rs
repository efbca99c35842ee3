//! Browser sessions
//!
//! The browser holds only an opaque session id, carried in an encrypted and
//! authenticated cookie. Session values live server-side in a
//! [`SessionStore`].
//!
//! Stores must apply each `store` or `remove` atomically per session id.
//! Two concurrent requests for one session each read, modify and write the
//! whole value map, so the last writer wins.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum_extra::extract::cookie::{Cookie, Key, PrivateCookieJar, SameSite};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::claims::Claims;
use super::error::AuthError;
use crate::config::{SessionConfig, MAX_SESSION_TTL_SECONDS, MIN_SESSION_KEY_BYTES};
use crate::error::{LocaleMgmtError, Result};

pub const STATE_KEY: &str = "state";
pub const ID_TOKEN_KEY: &str = "id_token";
pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const PROFILE_KEY: &str = "profile";

/// Session values keyed by name
pub type SessionValues = BTreeMap<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Opaque session identifier (UUID v4)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accept only well-formed UUIDs from the cookie.
    pub fn parse(value: &str) -> Option<Self> {
        Uuid::parse_str(value).ok().map(|id| Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// One browser session
#[derive(Debug, Clone)]
pub struct Session {
    id: SessionId,
    values: SessionValues,
    is_new: bool,
    replaced: Option<SessionId>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    /// Fresh, unsaved session
    pub fn new() -> Self {
        Self {
            id: SessionId::generate(),
            values: SessionValues::new(),
            is_new: true,
            replaced: None,
        }
    }

    /// Session read back from a store
    pub fn restore(id: SessionId, values: SessionValues) -> Self {
        Self {
            id,
            values,
            is_new: false,
            replaced: None,
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn is_new(&self) -> bool {
        self.is_new
    }

    pub fn values(&self) -> &SessionValues {
        &self.values
    }

    /// Stored id this session was moved away from, if any
    pub fn replaced(&self) -> Option<&SessionId> {
        self.replaced.as_ref()
    }

    /// Move the values to a fresh id. The old record is dropped on the next
    /// save.
    pub fn regenerate_id(&mut self) {
        let previous = std::mem::replace(&mut self.id, SessionId::generate());
        if !self.is_new && self.replaced.is_none() {
            self.replaced = Some(previous);
        }
        self.is_new = true;
    }

    fn get_str(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(serde_json::Value::as_str)
    }

    pub fn state(&self) -> Option<&str> {
        self.get_str(STATE_KEY)
    }

    pub fn set_state(&mut self, state: &str) {
        self.values
            .insert(STATE_KEY.to_string(), serde_json::Value::from(state));
    }

    pub fn id_token(&self) -> Option<&str> {
        self.get_str(ID_TOKEN_KEY)
    }

    pub fn access_token(&self) -> Option<&str> {
        self.get_str(ACCESS_TOKEN_KEY)
    }

    /// Stored identity claims. A malformed stored profile reads as absent.
    pub fn profile(&self) -> Option<Claims> {
        let value = self.values.get(PROFILE_KEY)?;
        match Claims::from_json(value.clone()) {
            Ok(claims) => Some(claims),
            Err(e) => {
                tracing::warn!(session_id = %self.id, error = %e, "Ignoring malformed stored profile");
                None
            }
        }
    }

    /// Record a completed login: both tokens and the profile. Consumes the
    /// login state and moves the session to a new id, so a cookie issued
    /// before login never becomes authenticated.
    pub fn complete_login(
        &mut self,
        id_token: &str,
        access_token: &str,
        profile: &Claims,
    ) -> std::result::Result<(), AuthError> {
        let profile = serde_json::to_value(profile)
            .map_err(|e| AuthError::SessionPersist(format!("failed to encode profile: {}", e)))?;

        self.values
            .insert(ID_TOKEN_KEY.to_string(), serde_json::Value::from(id_token));
        self.values.insert(
            ACCESS_TOKEN_KEY.to_string(),
            serde_json::Value::from(access_token),
        );
        self.values.insert(PROFILE_KEY.to_string(), profile);
        self.values.remove(STATE_KEY);
        self.regenerate_id();
        Ok(())
    }

    /// Authentication marker checked by the protected routes
    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some_and(|token| !token.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Server-side session persistence
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Values for `id`, or `None` when unknown or expired
    async fn load(&self, id: &SessionId) -> Result<Option<SessionValues>>;

    /// Replace the values for `id` and reset its expiry to `ttl` from now
    async fn store(&self, id: &SessionId, values: &SessionValues, ttl: Duration) -> Result<()>;

    async fn remove(&self, id: &SessionId) -> Result<()>;

    /// Drop expired records, returning how many were dropped
    async fn purge_expired(&self) -> Result<usize> {
        Ok(0)
    }
}

#[derive(Debug, Clone)]
struct StoredSession {
    values: SessionValues,
    expires_at: DateTime<Utc>,
}

/// In-process session store
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    sessions: RwLock<HashMap<SessionId, StoredSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, id: &SessionId) -> Result<Option<SessionValues>> {
        let sessions = self.sessions.read().await;
        Ok(sessions
            .get(id)
            .filter(|stored| stored.expires_at > Utc::now())
            .map(|stored| stored.values.clone()))
    }

    async fn store(&self, id: &SessionId, values: &SessionValues, ttl: Duration) -> Result<()> {
        let ttl = chrono::Duration::from_std(ttl)
            .map_err(|e| LocaleMgmtError::Config(format!("session ttl out of range: {}", e)))?;
        let stored = StoredSession {
            values: values.clone(),
            expires_at: Utc::now() + ttl,
        };
        self.sessions.write().await.insert(id.clone(), stored);
        Ok(())
    }

    async fn remove(&self, id: &SessionId) -> Result<()> {
        self.sessions.write().await.remove(id);
        Ok(())
    }

    async fn purge_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, stored| stored.expires_at > now);
        Ok(before - sessions.len())
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Moves sessions between the cookie jar and the store
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    key: Key,
    cookie_name: String,
    ttl: Duration,
    secure: bool,
}

impl SessionManager {
    /// # Errors
    ///
    /// Returns `LocaleMgmtError::Config` if the signing key is shorter than
    /// 32 bytes
    pub fn new(store: Arc<dyn SessionStore>, config: &SessionConfig) -> Result<Self> {
        if config.ttl_seconds == 0 || config.ttl_seconds > MAX_SESSION_TTL_SECONDS {
            return Err(LocaleMgmtError::Config(format!(
                "session ttl must be between 1 and {} seconds",
                MAX_SESSION_TTL_SECONDS
            ))
            .into());
        }
        if config.signing_key.len() < MIN_SESSION_KEY_BYTES {
            return Err(LocaleMgmtError::Config(format!(
                "session signing key must be at least {} bytes",
                MIN_SESSION_KEY_BYTES
            ))
            .into());
        }

        Ok(Self {
            store,
            key: Key::derive_from(config.signing_key.as_bytes()),
            cookie_name: config.cookie_name.clone(),
            ttl: Duration::from_secs(config.ttl_seconds),
            secure: config.secure_cookies,
        })
    }

    /// Cookie encryption key
    pub fn key(&self) -> &Key {
        &self.key
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Session named by the cookie, or a new unsaved one.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::Session`] if the store fails
    pub async fn load(&self, jar: &PrivateCookieJar) -> std::result::Result<Session, AuthError> {
        let Some(id) = jar
            .get(&self.cookie_name)
            .and_then(|cookie| SessionId::parse(cookie.value()))
        else {
            return Ok(Session::new());
        };

        match self
            .store
            .load(&id)
            .await
            .map_err(|e| AuthError::Session(e.to_string()))?
        {
            Some(values) => Ok(Session::restore(id, values)),
            None => {
                tracing::debug!(session_id = %id, "Session cookie names an unknown or expired session");
                Ok(Session::new())
            }
        }
    }

    /// Persist `session` and set its cookie. A record the session was moved
    /// away from is removed afterwards.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionPersist`] if the store fails
    pub async fn save(
        &self,
        session: &Session,
        jar: PrivateCookieJar,
    ) -> std::result::Result<PrivateCookieJar, AuthError> {
        self.store
            .store(session.id(), session.values(), self.ttl)
            .await
            .map_err(|e| AuthError::SessionPersist(e.to_string()))?;

        if let Some(previous) = session.replaced() {
            if let Err(e) = self.store.remove(previous).await {
                tracing::warn!(session_id = %previous, error = %e, "Failed to remove replaced session");
            }
        }

        Ok(jar.add(self.session_cookie(session.id())))
    }

    /// Remove `session` from the store and expire its cookie.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::SessionPersist`] if the store fails
    pub async fn destroy(
        &self,
        session: &Session,
        jar: PrivateCookieJar,
    ) -> std::result::Result<PrivateCookieJar, AuthError> {
        if !session.is_new() {
            self.store
                .remove(session.id())
                .await
                .map_err(|e| AuthError::SessionPersist(e.to_string()))?;
        }

        Ok(jar.remove(Cookie::build((self.cookie_name.clone(), "")).path("/")))
    }

    fn session_cookie(&self, id: &SessionId) -> Cookie<'static> {
        Cookie::build((self.cookie_name.clone(), id.to_string()))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(
                i64::try_from(self.ttl.as_secs()).unwrap_or(i64::MAX),
            ))
            .build()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
