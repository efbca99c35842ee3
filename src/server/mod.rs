//! HTTP gateway
//!
//! Wires the login flow, the session middleware and the locale API into one
//! axum router, and runs it together with its background tasks.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use axum::extract::FromRef;
use axum::middleware;
use axum::routing::{delete, get, post};
use axum::Router;
use axum_extra::extract::cookie::Key;

use crate::auth::logout::LogoutSettings;
use crate::auth::{MemorySessionStore, ProviderSettings, ProviderSource, SessionManager};
use crate::config::Config;
use crate::error::{LocaleMgmtError, Result};
use crate::locale::{LocaleStore, SqliteLocaleStore};

pub mod api;
pub mod guard;
pub mod handlers;

pub use guard::{require_auth, AuthenticatedUser};

/// Redirect targets and logout parameters used by the handlers
#[derive(Debug, Clone)]
pub struct RouteSettings {
    pub landing_path: String,
    pub login_prompt_path: String,
    pub logout: LogoutSettings,
}

impl From<&Config> for RouteSettings {
    fn from(config: &Config) -> Self {
        Self {
            landing_path: config.server.landing_path.clone(),
            login_prompt_path: config.server.login_prompt_path.clone(),
            logout: LogoutSettings::from(&config.auth),
        }
    }
}

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<ProviderSource>,
    pub sessions: Arc<SessionManager>,
    pub locales: Arc<dyn LocaleStore>,
    pub routes: Arc<RouteSettings>,
}

impl FromRef<AppState> for Key {
    fn from_ref(state: &AppState) -> Self {
        state.sessions.key().clone()
    }
}

impl AppState {
    /// Build the production state: in-memory sessions and SQLite locales.
    pub fn from_config(config: &Config) -> Result<Self> {
        let provider = ProviderSource::new(ProviderSettings::from(&config.auth))
            .map_err(|e| LocaleMgmtError::Config(e.to_string()))?;
        let sessions = SessionManager::new(Arc::new(MemorySessionStore::new()), &config.session)?;
        let locales = SqliteLocaleStore::from_config(&config.storage)?;

        Ok(Self {
            provider: Arc::new(provider),
            sessions: Arc::new(sessions),
            locales: Arc::new(locales),
            routes: Arc::new(RouteSettings::from(config)),
        })
    }
}

/// Build the router.
///
/// Everything under `/api/v1` requires an authenticated session.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/restricted", get(api::restricted))
        .route("/langs", get(api::list_langs))
        .route("/bundles", get(api::list_bundles))
        .route("/bundle/:bundle_id/langs", get(api::list_bundle_langs))
        .route("/locale-item/:id", get(api::get_item))
        .route("/locale-item", post(api::post_item))
        .route("/locale-items", post(api::post_items))
        .route(
            "/locale-items/:bundle",
            post(api::query_items).delete(api::delete_items),
        )
        .route("/locale-items/:bundle/lang/:lang_id", delete(api::delete_items))
        .route(
            "/locale-items/:bundle/lang/:lang_id/key/:key_id",
            delete(api::delete_items),
        )
        .route("/locale-items/:bundle/key/:key_id", delete(api::delete_items))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth));

    Router::new()
        .route("/login", get(handlers::login))
        .route("/callback", get(handlers::callback))
        .route("/logout", get(handlers::logout))
        .route("/info", get(handlers::info))
        .route("/welcome", get(handlers::welcome))
        .nest("/api/v1", protected)
        .with_state(state)
}

/// Start the periodic session sweep and, when configured, discovery refresh.
pub fn spawn_background_tasks(state: &AppState, config: &Config) {
    if config.session.cleanup_interval_seconds > 0 {
        let store = Arc::clone(state.sessions.store());
        let period = Duration::from_secs(config.session.cleanup_interval_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.purge_expired().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!(purged, "Purged expired sessions"),
                    Err(e) => tracing::warn!(error = %e, "Session sweep failed"),
                }
            }
        });
    }

    if config.auth.cache_discovery && config.auth.discovery_refresh_seconds > 0 {
        let provider = Arc::clone(&state.provider);
        let period = Duration::from_secs(config.auth.discovery_refresh_seconds);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(e) = provider.refresh().await {
                    tracing::warn!(error = %e, "Discovery refresh failed, keeping previous metadata");
                }
            }
        });
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

/// Run the gateway until Ctrl-C.
pub async fn serve(config: Config) -> Result<()> {
    let state = AppState::from_config(&config)?;

    // A failed warm-up is retried on the first login.
    if let Err(e) = state.provider.get().await {
        tracing::warn!(error = %e, "Provider discovery failed at startup");
    }

    spawn_background_tasks(&state, &config);

    let listener = tokio::net::TcpListener::bind(&config.server.bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_address))?;
    tracing::info!(address = %config.server.bind_address, "Listening");

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}
