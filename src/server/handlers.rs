//! Login, callback, logout and session inspection handlers

use axum::extract::{Query, State};
use axum::http::header::HOST;
use axum::http::{HeaderMap, Uri};
use axum::response::Redirect;
use axum::Json;
use axum_extra::extract::cookie::PrivateCookieJar;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::auth::logout::build_logout_url;
use crate::auth::state::generate_state;
use crate::auth::{AuthError, Claims, ErrorMessage};

/// Service version reported by `/info`
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Query parameters the provider appends to the callback
#[derive(Debug, Default, Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// Body of `/info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoResponse {
    pub version: String,
    pub user: Option<Claims>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<String>,
}

/// Start a login: remember a fresh state in the session and send the
/// browser to the provider.
pub async fn login(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    let login_state = generate_state();

    let mut session = state.sessions.load(&jar).await?;
    session.set_state(&login_state);
    let jar = state.sessions.save(&session, jar).await?;

    let provider = state.provider.get().await?;
    let url = provider.authorization_url(&login_state)?;

    tracing::info!(session_id = %session.id(), "Redirecting to identity provider");
    Ok((jar, Redirect::temporary(url.as_str())))
}

/// Finish a login. Nothing is written to the session unless every step
/// succeeds.
pub async fn callback(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    let mut session = state.sessions.load(&jar).await?;

    if session.state() != Some(params.state.as_str()) {
        tracing::warn!(session_id = %session.id(), "Callback state does not match session");
        return Err(AuthError::InvalidState);
    }

    if let Some(error) = params.error {
        return Err(AuthError::TokenExchange(format!(
            "provider returned {}: {}",
            error,
            params.error_description.unwrap_or_default()
        )));
    }

    let provider = state.provider.get().await?;
    let tokens = provider.exchange_code(&params.code).await?;
    let raw_id_token = tokens.id_token().ok_or(AuthError::MissingIdentityToken)?;
    let verified = provider.verify_identity_token(raw_id_token).await?;
    let profile = verified.claims()?;

    session.complete_login(raw_id_token, &tokens.access_token, &profile)?;
    let jar = state.sessions.save(&session, jar).await?;

    tracing::info!(
        session_id = %session.id(),
        subject = profile.subject().unwrap_or_default(),
        "Login completed"
    );
    Ok((jar, Redirect::to(&state.routes.landing_path)))
}

fn request_scheme(headers: &HeaderMap) -> &str {
    headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|value| *value == "http" || *value == "https")
        .unwrap_or("http")
}

/// `Host` header, else the authority of an absolute request URI
fn request_host<'a>(headers: &'a HeaderMap, uri: &'a Uri) -> &'a str {
    headers
        .get(HOST)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .or_else(|| uri.authority().map(|authority| authority.as_str()))
        .unwrap_or_default()
}

/// Drop the local session and send the browser to the provider's logout
/// endpoint.
pub async fn logout(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    uri: Uri,
    headers: HeaderMap,
) -> Result<(PrivateCookieJar, Redirect), AuthError> {
    let url = build_logout_url(
        &state.routes.logout,
        request_scheme(&headers),
        request_host(&headers, &uri),
    )?;

    let jar = match state.sessions.load(&jar).await {
        Ok(session) => match state.sessions.destroy(&session, jar.clone()).await {
            Ok(cleared) => cleared,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to remove session on logout");
                jar
            }
        },
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load session on logout");
            jar
        }
    };

    Ok((jar, Redirect::temporary(url.as_str())))
}

/// Report the service version and whatever identity the session holds.
pub async fn info(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
) -> Result<Json<InfoResponse>, AuthError> {
    let session = state.sessions.load(&jar).await?;
    Ok(Json(InfoResponse {
        version: VERSION.to_string(),
        user: session.profile(),
        access_token: session.access_token().map(str::to_string),
        id_token: session.id_token().map(str::to_string),
    }))
}

pub async fn welcome() -> Json<ErrorMessage> {
    Json(ErrorMessage::new("Welcome! Sign in at /login"))
}
