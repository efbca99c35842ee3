//! Shared fixtures: a wiremock identity provider and the router under test.
#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{COOKIE, HOST, LOCATION, SET_COOKIE};
use axum::http::{Request, Response};
use axum::response::IntoResponse;
use axum::Router;
use axum_extra::extract::cookie::{Cookie, PrivateCookieJar};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use locale_mgmt::auth::session::SessionId;
use locale_mgmt::auth::{
    Claims, MemorySessionStore, ProviderSettings, ProviderSource, Session, SessionManager,
    SessionStore,
};
use locale_mgmt::config::Config;
use locale_mgmt::locale::SqliteLocaleStore;
use locale_mgmt::server::RouteSettings;
use locale_mgmt::{build_router, AppState};

pub const CLIENT_ID: &str = "locale-mgmt-test";
pub const CLIENT_SECRET: &str = "test-secret";
pub const SESSION_KEY: &str = "test-session-signing-key-with-enough-bytes!";
pub const KID: &str = "test-key";
pub const APP_HOST: &str = "localhost:8080";

pub const SIGNING_KEY_PEM: &str = include_str!("../fixtures/rsa-private.pem");
pub const WRONG_KEY_PEM: &str = include_str!("../fixtures/wrong-key-private.pem");
pub const JWKS: &str = include_str!("../fixtures/jwks.json");

// ---------------------------------------------------------------------------
// Identity provider double
// ---------------------------------------------------------------------------

pub struct TestProvider {
    pub server: MockServer,
}

impl TestProvider {
    pub async fn start() -> Self {
        Self {
            server: MockServer::start().await,
        }
    }

    /// Issuer with a trailing slash, the way hosted providers publish it
    pub fn issuer(&self) -> String {
        format!("{}/", self.server.uri())
    }

    pub fn discovery_body(&self) -> Value {
        let base = self.server.uri();
        json!({
            "issuer": self.issuer(),
            "authorization_endpoint": format!("{}/authorize", base),
            "token_endpoint": format!("{}/oauth/token", base),
            "jwks_uri": format!("{}/.well-known/jwks.json", base),
            "userinfo_endpoint": format!("{}/userinfo", base),
            "response_types_supported": ["code"],
            "id_token_signing_alg_values_supported": ["RS256"]
        })
    }

    pub async fn mount_discovery(&self) {
        Mock::given(method("GET"))
            .and(path("/.well-known/openid-configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(self.discovery_body()))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_jwks(&self) {
        Mock::given(method("GET"))
            .and(path("/.well-known/jwks.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(JWKS.as_bytes().to_vec(), "application/json"),
            )
            .mount(&self.server)
            .await;
    }

    pub async fn mount_token_response(&self, body: Value) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&self.server)
            .await;
    }

    pub async fn mount_token_error(&self, status: u16) {
        Mock::given(method("POST"))
            .and(path("/oauth/token"))
            .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                "error": "invalid_grant",
                "error_description": "Invalid authorization code"
            })))
            .mount(&self.server)
            .await;
    }

    /// Discovery and keys, the common baseline
    pub async fn mount_defaults(&self) {
        self.mount_discovery().await;
        self.mount_jwks().await;
    }

    /// Standard claims for a token issued to this client
    pub fn claims(&self, name: &str) -> Value {
        let now = chrono::Utc::now().timestamp();
        json!({
            "iss": self.issuer(),
            "sub": "auth0|42",
            "aud": CLIENT_ID,
            "iat": now,
            "exp": now + 600,
            "name": name,
            "nickname": "ada"
        })
    }
}

pub fn sign_id_token(claims: &Value, pem: &str, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).expect("fixture key");
    jsonwebtoken::encode(&header, claims, &key).expect("sign id token")
}

pub fn token_response(id_token: Option<&str>) -> Value {
    let mut body = json!({
        "access_token": "provider-access-token",
        "token_type": "Bearer",
        "expires_in": 86400,
        "scope": "openid profile"
    });
    if let Some(id_token) = id_token {
        body["id_token"] = Value::String(id_token.to_string());
    }
    body
}

// ---------------------------------------------------------------------------
// Application under test
// ---------------------------------------------------------------------------

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub provider: TestProvider,
    _dir: TempDir,
}

pub fn test_config(issuer: &str, dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.auth.issuer_url = issuer.to_string();
    config.auth.client_id = CLIENT_ID.to_string();
    config.auth.client_secret = CLIENT_SECRET.to_string();
    config.auth.redirect_url = format!("http://{}/callback", APP_HOST);
    config.auth.http_timeout_seconds = 5;
    config.session.signing_key = SESSION_KEY.to_string();
    config.storage.db_path = Some(dir.path().join("locale.db"));
    config
}

impl TestApp {
    pub async fn new(provider: TestProvider) -> Self {
        Self::with_store(provider, Arc::new(MemorySessionStore::new())).await
    }

    pub async fn with_store(provider: TestProvider, store: Arc<dyn SessionStore>) -> Self {
        let dir = TempDir::new().expect("tempdir");
        let config = test_config(&provider.issuer(), &dir);
        config.validate().expect("valid test config");

        let state = AppState {
            provider: Arc::new(
                ProviderSource::new(ProviderSettings::from(&config.auth)).expect("provider source"),
            ),
            sessions: Arc::new(SessionManager::new(store, &config.session).expect("sessions")),
            locales: Arc::new(
                SqliteLocaleStore::from_config(&config.storage).expect("locale store"),
            ),
            routes: Arc::new(RouteSettings::from(&config)),
        };

        Self {
            router: build_router(state.clone()),
            state,
            provider,
            _dir: dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible")
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        self.send(request("GET", uri, cookie, Body::empty())).await
    }

    /// Load the session a cookie refers to
    pub async fn session(&self, cookie: &str) -> Session {
        let mut headers = axum::http::HeaderMap::new();
        headers.insert(COOKIE, cookie.parse().expect("cookie header"));
        let jar = PrivateCookieJar::from_headers(&headers, self.state.sessions.key().clone());
        self.state.sessions.load(&jar).await.expect("load session")
    }

    /// Cookie for a session that already completed a login
    pub async fn authenticated_cookie(&self, name: &str) -> String {
        let profile: Claims =
            Claims::from_json(json!({"sub": "auth0|42", "name": name})).expect("claims");
        let mut session = Session::new();
        session
            .complete_login("raw.id.token", "access-token", &profile)
            .expect("complete login");

        let jar = PrivateCookieJar::new(self.state.sessions.key().clone());
        let jar = self.state.sessions.save(&session, jar).await.expect("save");
        session_cookie(&jar.into_response()).expect("session cookie")
    }

    /// Session cookie naming `id`, whether or not the store knows it
    pub fn cookie_for(&self, id: &SessionId) -> String {
        let jar = PrivateCookieJar::new(self.state.sessions.key().clone())
            .add(Cookie::new("auth-session", id.to_string()));
        session_cookie(&jar.into_response()).expect("session cookie")
    }

    /// Run `/login` and return `(state, cookie)`
    pub async fn login(&self) -> (String, String) {
        let response = self.get("/login", None).await;
        assert_eq!(response.status(), 307);
        let cookie = session_cookie(&response).expect("login sets a session cookie");
        let location = url::Url::parse(&location(&response)).expect("absolute redirect");
        let state = location
            .query_pairs()
            .find(|(name, _)| name == "state")
            .map(|(_, value)| value.into_owned())
            .expect("state parameter");
        (state, cookie)
    }
}

// ---------------------------------------------------------------------------
// HTTP helpers
// ---------------------------------------------------------------------------

pub fn request(method: &str, uri: &str, cookie: Option<&str>, body: Body) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(HOST, APP_HOST);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(body).expect("request")
}

pub fn json_request(method: &str, uri: &str, cookie: Option<&str>, body: &Value) -> Request<Body> {
    let mut request = request(method, uri, cookie, Body::from(body.to_string()));
    request.headers_mut().insert(
        axum::http::header::CONTENT_TYPE,
        "application/json".parse().expect("content type"),
    );
    request
}

/// `name=value` of the session cookie set by a response, if any
pub fn session_cookie<B>(response: &Response<B>) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find(|value| value.starts_with("auth-session="))
        .and_then(|value| value.split(';').next())
        .map(str::to_string)
}

pub fn location<B>(response: &Response<B>) -> String {
    response
        .headers()
        .get(LOCATION)
        .expect("location header")
        .to_str()
        .expect("ascii location")
        .to_string()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}
