//! Configuration management for locale-mgmt
//!
//! Configuration is read from a YAML file, then overridden by environment
//! variables and finally by command line flags.

use anyhow::Context;

use crate::cli::Cli;
use crate::error::{LocaleMgmtError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Minimum length of the session signing key in bytes
pub const MIN_SESSION_KEY_BYTES: usize = 32;

/// Upper bound for `session.ttl_seconds` (ten years)
pub const MAX_SESSION_TTL_SECONDS: u64 = 10 * 365 * 24 * 60 * 60;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP listener and routing configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity provider registration
    #[serde(default)]
    pub auth: AuthConfig,

    /// Session cookie and store configuration
    #[serde(default)]
    pub session: SessionConfig,

    /// Locale storage configuration
    #[serde(default)]
    pub storage: StorageConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address to listen on
    #[serde(default = "default_bind_address")]
    pub bind_address: String,

    /// Where the browser lands after a successful login
    #[serde(default = "default_landing_path")]
    pub landing_path: String,

    /// Where unauthenticated requests to protected routes are sent
    #[serde(default = "default_login_prompt_path")]
    pub login_prompt_path: String,
}

fn default_bind_address() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_landing_path() -> String {
    "/info".to_string()
}

fn default_login_prompt_path() -> String {
    "/welcome".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            landing_path: default_landing_path(),
            login_prompt_path: default_login_prompt_path(),
        }
    }
}

/// OpenID Connect client registration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Issuer URL of the identity provider
    #[serde(default)]
    pub issuer_url: String,

    /// Client identifier registered with the provider
    #[serde(default)]
    pub client_id: String,

    /// Client secret registered with the provider
    #[serde(default)]
    pub client_secret: String,

    /// Callback URL registered with the provider
    #[serde(default)]
    pub redirect_url: String,

    /// Scopes requested at login
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Provider logout path, relative to the issuer
    #[serde(default = "default_logout_path")]
    pub logout_path: String,

    /// Local path the provider returns to after logout
    #[serde(default = "default_logout_return_path")]
    pub logout_return_path: Option<String>,

    /// Timeout applied to every call made to the provider
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,

    /// Reuse the discovered provider metadata across requests
    #[serde(default = "default_cache_discovery")]
    pub cache_discovery: bool,

    /// Interval for re-running discovery in the background (0 disables)
    #[serde(default)]
    pub discovery_refresh_seconds: u64,
}

fn default_scopes() -> Vec<String> {
    vec!["openid".to_string(), "profile".to_string()]
}

fn default_logout_path() -> String {
    "/v2/logout".to_string()
}

fn default_logout_return_path() -> Option<String> {
    Some("/welcome".to_string())
}

fn default_http_timeout_seconds() -> u64 {
    10
}

fn default_cache_discovery() -> bool {
    true
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            issuer_url: String::new(),
            client_id: String::new(),
            client_secret: String::new(),
            redirect_url: String::new(),
            scopes: default_scopes(),
            logout_path: default_logout_path(),
            logout_return_path: default_logout_return_path(),
            http_timeout_seconds: default_http_timeout_seconds(),
            cache_discovery: default_cache_discovery(),
            discovery_refresh_seconds: 0,
        }
    }
}

/// Session cookie configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Name of the session cookie
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,

    /// Secret the cookie encryption key is derived from
    #[serde(default)]
    pub signing_key: String,

    /// Session lifetime
    #[serde(default = "default_session_ttl_seconds")]
    pub ttl_seconds: u64,

    /// Mark the cookie `Secure`
    #[serde(default)]
    pub secure_cookies: bool,

    /// How often expired sessions are swept from the store
    #[serde(default = "default_cleanup_interval_seconds")]
    pub cleanup_interval_seconds: u64,
}

fn default_cookie_name() -> String {
    "auth-session".to_string()
}

fn default_session_ttl_seconds() -> u64 {
    30 * 24 * 60 * 60
}

fn default_cleanup_interval_seconds() -> u64 {
    300
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_name: default_cookie_name(),
            signing_key: String::new(),
            ttl_seconds: default_session_ttl_seconds(),
            secure_cookies: false,
            cleanup_interval_seconds: default_cleanup_interval_seconds(),
        }
    }
}

/// Locale storage configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file; defaults to the platform data directory
    #[serde(default)]
    pub db_path: Option<PathBuf>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    #[serde(default)]
    pub json_format: bool,

    /// Also append log lines to this file
    #[serde(default)]
    pub file_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "locale_mgmt=info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json_format: false,
            file_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file, environment variables, and CLI overrides
    ///
    /// A missing file is not an error; defaults are used and a warning is
    /// logged. Call [`Config::validate`] before using the result.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the YAML configuration file
    /// * `cli` - Parsed command line arguments
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(LocaleMgmtError::from)
            .with_context(|| format!("Failed to read config file {}", path))?;
        let config = serde_yaml::from_str(&contents)
            .map_err(LocaleMgmtError::from)
            .with_context(|| format!("Failed to parse config file {}", path))?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(issuer_url) = std::env::var("LOCALE_MGMT_ISSUER_URL") {
            tracing::debug!(issuer_url = %issuer_url, "Env override: LOCALE_MGMT_ISSUER_URL");
            self.auth.issuer_url = issuer_url;
        }

        if let Ok(client_id) = std::env::var("LOCALE_MGMT_CLIENT_ID") {
            tracing::debug!(client_id = %client_id, "Env override: LOCALE_MGMT_CLIENT_ID");
            self.auth.client_id = client_id;
        }

        if let Ok(client_secret) = std::env::var("LOCALE_MGMT_CLIENT_SECRET") {
            tracing::debug!("Env override: LOCALE_MGMT_CLIENT_SECRET");
            self.auth.client_secret = client_secret;
        }

        if let Ok(redirect_url) = std::env::var("LOCALE_MGMT_REDIRECT_URL") {
            tracing::debug!(redirect_url = %redirect_url, "Env override: LOCALE_MGMT_REDIRECT_URL");
            self.auth.redirect_url = redirect_url;
        }

        if let Ok(timeout) = std::env::var("LOCALE_MGMT_HTTP_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.auth.http_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid LOCALE_MGMT_HTTP_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(signing_key) = std::env::var("LOCALE_MGMT_SESSION_KEY") {
            tracing::debug!("Env override: LOCALE_MGMT_SESSION_KEY");
            self.session.signing_key = signing_key;
        }

        if let Ok(secure) = std::env::var("LOCALE_MGMT_SECURE_COOKIES") {
            match secure.parse::<bool>() {
                Ok(value) => self.session.secure_cookies = value,
                Err(_) => tracing::warn!("Invalid LOCALE_MGMT_SECURE_COOKIES: {}", secure),
            }
        }

        if let Ok(db_path) = std::env::var("LOCALE_MGMT_DB_PATH") {
            tracing::debug!(db_path = %db_path, "Env override: LOCALE_MGMT_DB_PATH");
            self.storage.db_path = Some(PathBuf::from(db_path));
        }

        // PORT is honoured for container platforms; an explicit bind wins.
        if let Ok(bind) = std::env::var("LOCALE_MGMT_BIND") {
            self.server.bind_address = bind;
        } else if let Ok(port) = std::env::var("PORT") {
            match port.parse::<u16>() {
                Ok(port) => self.server.bind_address = format!("0.0.0.0:{}", port),
                Err(_) => tracing::warn!("Invalid PORT: {}", port),
            }
        }

        if let Ok(json) = std::env::var("LOCALE_MGMT_LOG_JSON") {
            match json.parse::<bool>() {
                Ok(value) => self.logging.json_format = value,
                Err(_) => tracing::warn!("Invalid LOCALE_MGMT_LOG_JSON: {}", json),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(bind) = cli.bind_override() {
            self.server.bind_address = bind.to_string();
        }

        if cli.verbose {
            self.logging.level = "locale_mgmt=debug".to_string();
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns `LocaleMgmtError::Config` describing the first problem found
    pub fn validate(&self) -> Result<()> {
        if self.auth.issuer_url.trim().is_empty() {
            return Err(LocaleMgmtError::Config("auth.issuer_url must be set".to_string()).into());
        }
        url::Url::parse(&self.auth.issuer_url).map_err(|e| {
            LocaleMgmtError::Config(format!("auth.issuer_url is not a valid URL: {}", e))
        })?;

        if self.auth.client_id.trim().is_empty() {
            return Err(LocaleMgmtError::Config("auth.client_id must be set".to_string()).into());
        }

        if self.auth.client_secret.is_empty() {
            return Err(
                LocaleMgmtError::Config("auth.client_secret must be set".to_string()).into(),
            );
        }

        url::Url::parse(&self.auth.redirect_url).map_err(|e| {
            LocaleMgmtError::Config(format!("auth.redirect_url is not a valid URL: {}", e))
        })?;

        for required in ["openid", "profile"] {
            if !self.auth.scopes.iter().any(|scope| scope == required) {
                return Err(LocaleMgmtError::Config(format!(
                    "auth.scopes must include '{}'",
                    required
                ))
                .into());
            }
        }

        if self.auth.http_timeout_seconds == 0 {
            return Err(LocaleMgmtError::Config(
                "auth.http_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.session.signing_key.len() < MIN_SESSION_KEY_BYTES {
            return Err(LocaleMgmtError::Config(format!(
                "session.signing_key must be at least {} bytes",
                MIN_SESSION_KEY_BYTES
            ))
            .into());
        }

        if self.session.cookie_name.trim().is_empty() {
            return Err(
                LocaleMgmtError::Config("session.cookie_name must not be empty".to_string()).into(),
            );
        }

        let ttl = self.session.ttl_seconds;
        if ttl == 0 || ttl > MAX_SESSION_TTL_SECONDS {
            return Err(LocaleMgmtError::Config(format!(
                "session.ttl_seconds must be between 1 and {}",
                MAX_SESSION_TTL_SECONDS
            ))
            .into());
        }

        let paths = [
            ("server.landing_path", Some(&self.server.landing_path)),
            ("server.login_prompt_path", Some(&self.server.login_prompt_path)),
            ("auth.logout_path", Some(&self.auth.logout_path)),
            ("auth.logout_return_path", self.auth.logout_return_path.as_ref()),
        ];
        for (name, path) in paths {
            if let Some(path) = path {
                if !path.starts_with('/') {
                    return Err(
                        LocaleMgmtError::Config(format!("{} must start with '/'", name)).into(),
                    );
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{create_test_file, temp_dir};
    use serial_test::serial;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.auth.issuer_url = "https://tenant.example.com/".to_string();
        config.auth.client_id = "client-123".to_string();
        config.auth.client_secret = "secret".to_string();
        config.auth.redirect_url = "http://localhost:8080/callback".to_string();
        config.session.signing_key = "k".repeat(MIN_SESSION_KEY_BYTES);
        config
    }

    #[test]
    fn test_config_defaults() {
        let config = Config::default();
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
        assert_eq!(config.server.landing_path, "/info");
        assert_eq!(config.server.login_prompt_path, "/welcome");
        assert_eq!(config.auth.scopes, vec!["openid", "profile"]);
        assert_eq!(config.auth.logout_path, "/v2/logout");
        assert_eq!(config.auth.logout_return_path.as_deref(), Some("/welcome"));
        assert_eq!(config.auth.http_timeout_seconds, 10);
        assert!(config.auth.cache_discovery);
        assert_eq!(config.session.cookie_name, "auth-session");
        assert!(!config.session.secure_cookies);
        assert!(config.storage.db_path.is_none());
        assert_eq!(config.logging.level, "locale_mgmt=info");
    }

    #[test]
    fn test_valid_config_passes_validation() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_missing_issuer() {
        let mut config = valid_config();
        config.auth.issuer_url = String::new();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("issuer_url"));
    }

    #[test]
    fn test_validation_rejects_bad_redirect_url() {
        let mut config = valid_config();
        config.auth.redirect_url = "callback".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("redirect_url"));
    }

    #[test]
    fn test_validation_requires_openid_and_profile_scopes() {
        let mut config = valid_config();
        config.auth.scopes = vec!["openid".to_string()];
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("'profile'"));
    }

    #[test]
    fn test_validation_rejects_short_signing_key() {
        let mut config = valid_config();
        config.session.signing_key = "short".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("signing_key"));
    }

    #[test]
    fn test_validation_bounds_session_ttl() {
        let mut config = valid_config();
        config.session.ttl_seconds = 0;
        assert!(config.validate().is_err());

        config.session.ttl_seconds = u64::MAX;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("session.ttl_seconds"));

        config.session.ttl_seconds = MAX_SESSION_TTL_SECONDS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_relative_paths() {
        let mut config = valid_config();
        config.server.landing_path = "info".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("server.landing_path"));
    }

    #[test]
    fn test_validation_allows_missing_logout_return_path() {
        let mut config = valid_config();
        config.auth.logout_return_path = None;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_yaml_with_partial_sections() {
        let yaml = r#"
auth:
  issuer_url: "https://tenant.example.com/"
  client_id: "abc"
session:
  ttl_seconds: 60
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.auth.client_id, "abc");
        assert_eq!(config.auth.scopes, vec!["openid", "profile"]);
        assert_eq!(config.session.ttl_seconds, 60);
        assert_eq!(config.session.cookie_name, "auth-session");
        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    #[serial]
    fn test_load_from_file_applies_cli_overrides() {
        let dir = temp_dir();
        let path = create_test_file(
            &dir,
            "config.yaml",
            "server:\n  bind_address: \"127.0.0.1:3000\"\n",
        );
        let cli = Cli {
            config: None,
            verbose: true,
            command: crate::cli::Commands::Serve {
                bind: Some("127.0.0.1:4000".to_string()),
            },
        };

        let config = Config::load(path.to_str().unwrap(), &cli).unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:4000");
        assert_eq!(config.logging.level, "locale_mgmt=debug");
    }

    #[test]
    #[serial]
    fn test_load_missing_file_uses_defaults() {
        let config = Config::load("/nonexistent/config.yaml", &Cli::default()).unwrap();
        assert_eq!(config.session.cookie_name, "auth-session");
    }

    #[test]
    #[serial]
    fn test_load_rejects_malformed_file() {
        let dir = temp_dir();
        let path = create_test_file(&dir, "config.yaml", "auth: [unclosed");
        let error = Config::load(path.to_str().unwrap(), &Cli::default()).unwrap_err();
        assert!(matches!(
            error.downcast_ref::<LocaleMgmtError>(),
            Some(LocaleMgmtError::Yaml(_))
        ));
        assert!(error.to_string().contains("Failed to parse config file"));
    }

    #[test]
    #[serial]
    fn test_env_overrides() {
        std::env::set_var("LOCALE_MGMT_CLIENT_ID", "env-client");
        std::env::set_var("LOCALE_MGMT_ISSUER_URL", "https://env.example.com/");
        std::env::set_var("PORT", "9090");

        let config = Config::load("/nonexistent/config.yaml", &Cli::default()).unwrap();

        std::env::remove_var("LOCALE_MGMT_CLIENT_ID");
        std::env::remove_var("LOCALE_MGMT_ISSUER_URL");
        std::env::remove_var("PORT");

        assert_eq!(config.auth.client_id, "env-client");
        assert_eq!(config.auth.issuer_url, "https://env.example.com/");
        assert_eq!(config.server.bind_address, "0.0.0.0:9090");
    }

    #[test]
    #[serial]
    fn test_invalid_port_env_is_ignored() {
        std::env::set_var("PORT", "not-a-port");
        let config = Config::load("/nonexistent/config.yaml", &Cli::default()).unwrap();
        std::env::remove_var("PORT");

        assert_eq!(config.server.bind_address, "0.0.0.0:8080");
    }

    #[test]
    fn test_shipped_config_file_parses() {
        let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config/config.yaml");
        let contents = std::fs::read_to_string(path).unwrap();
        let config: Config = serde_yaml::from_str(&contents).unwrap();
        assert_eq!(config.session.cookie_name, "auth-session");
    }
}
