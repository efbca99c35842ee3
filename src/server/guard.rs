//! Session check in front of the protected routes

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::PrivateCookieJar;

use super::AppState;
use crate::auth::session::SessionId;
use crate::auth::Claims;

/// Identity attached to requests that passed [`require_auth`]
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub session_id: SessionId,
    pub profile: Claims,
}

/// Let the request through only when its session holds an access token.
///
/// Anything else is sent to the login prompt with a temporary redirect.
/// The session is only read, never written.
pub async fn require_auth(
    State(state): State<AppState>,
    jar: PrivateCookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let session = match state.sessions.load(&jar).await {
        Ok(session) => session,
        Err(e) => return e.into_response(),
    };

    if !session.is_authenticated() {
        tracing::debug!(path = %request.uri().path(), "Unauthenticated request to protected route");
        return Redirect::temporary(&state.routes.login_prompt_path).into_response();
    }

    let user = AuthenticatedUser {
        session_id: session.id().clone(),
        profile: session.profile().unwrap_or_default(),
    };
    request.extensions_mut().insert(user);

    next.run(request).await
}
