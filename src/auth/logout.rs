//! Provider logout redirect

use url::Url;

use super::error::AuthError;
use crate::config::AuthConfig;

/// What the logout redirect is built from
#[derive(Debug, Clone)]
pub struct LogoutSettings {
    pub issuer_url: String,
    pub logout_path: String,
    pub client_id: String,
    pub return_path: Option<String>,
}

impl From<&AuthConfig> for LogoutSettings {
    fn from(config: &AuthConfig) -> Self {
        Self {
            issuer_url: config.issuer_url.clone(),
            logout_path: config.logout_path.clone(),
            client_id: config.client_id.clone(),
            return_path: config.logout_return_path.clone(),
        }
    }
}

/// Build the provider logout URL.
///
/// `scheme` and `host` describe the request that asked to log out; the
/// provider sends the browser back to `scheme://host` plus the configured
/// return path. Without a host the return address is the bare return path,
/// and `returnTo` is left out when there is no return path either.
///
/// # Errors
///
/// Returns [`AuthError::UrlConstruction`] if the issuer is not a URL or the
/// host cannot form a return address.
///
/// # Examples
///
/// ```
/// use locale_mgmt::auth::logout::{build_logout_url, LogoutSettings};
///
/// let settings = LogoutSettings {
///     issuer_url: "https://tenant.example.com/".to_string(),
///     logout_path: "/v2/logout".to_string(),
///     client_id: "abc".to_string(),
///     return_path: Some("/welcome".to_string()),
/// };
/// let url = build_logout_url(&settings, "http", "localhost:8080").unwrap();
/// assert_eq!(
///     url.as_str(),
///     "https://tenant.example.com/v2/logout?returnTo=http%3A%2F%2Flocalhost%3A8080%2Fwelcome&client_id=abc"
/// );
/// ```
pub fn build_logout_url(
    settings: &LogoutSettings,
    scheme: &str,
    host: &str,
) -> Result<Url, AuthError> {
    let mut url = Url::parse(&settings.issuer_url).map_err(|e| {
        AuthError::UrlConstruction(format!("invalid issuer URL '{}': {}", settings.issuer_url, e))
    })?;

    let path = format!(
        "{}/{}",
        url.path().trim_end_matches('/'),
        settings.logout_path.trim_start_matches('/')
    );
    url.set_path(&path);

    if host.is_empty() {
        {
            let mut query = url.query_pairs_mut();
            if let Some(return_path) = settings.return_path.as_deref() {
                query.append_pair("returnTo", return_path);
            }
            query.append_pair("client_id", &settings.client_id);
        }
        return Ok(url);
    }

    let return_to = format!(
        "{}://{}{}",
        scheme,
        host,
        settings.return_path.as_deref().unwrap_or("")
    );
    let parsed = Url::parse(&return_to).map_err(|e| {
        AuthError::UrlConstruction(format!("invalid return address '{}': {}", return_to, e))
    })?;
    if parsed.host_str().is_none() {
        return Err(AuthError::UrlConstruction(format!(
            "return address '{}' has no host",
            return_to
        )));
    }

    url.query_pairs_mut()
        .append_pair("returnTo", &return_to)
        .append_pair("client_id", &settings.client_id);

    Ok(url)
}
