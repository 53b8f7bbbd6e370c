//! TOML-based configuration system for the gradebook.
//!
//! All sensitive values (OAuth client secret, service-account keys, bearer
//! tokens) are stored as `_env` fields that reference environment variable
//! names. The actual secrets are resolved at runtime via
//! [`AppConfig::resolve_env_vars`].

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Upper bound for `server.session_ttl_hours` (one year).
pub const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Google OAuth client used to sign students in.
    pub oauth: OAuthConfig,

    /// Spreadsheet holding the grades.
    pub sheets: SheetsConfig,
}

// ---------------------------------------------------------------------------
// Server
// ---------------------------------------------------------------------------

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address (default `127.0.0.1:8501`).
    #[serde(default = "default_listen")]
    pub listen: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Hours a login stays valid (1 to [`MAX_SESSION_TTL_HOURS`]).
    #[serde(default = "default_session_ttl")]
    pub session_ttl_hours: i64,

    /// Add the `Secure` attribute to the session cookie. Enable behind TLS.
    #[serde(default)]
    pub cookie_secure: bool,
}

fn default_listen() -> String {
    "127.0.0.1:8501".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_session_ttl() -> i64 {
    24
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            log_level: default_log_level(),
            session_ttl_hours: default_session_ttl(),
            cookie_secure: false,
        }
    }
}

// ---------------------------------------------------------------------------
// OAuth
// ---------------------------------------------------------------------------

/// Google OAuth web client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    /// OAuth client ID from the Google Cloud console.
    pub client_id: String,

    /// Environment variable holding the OAuth client secret.
    pub client_secret_env: String,

    /// Redirect URI registered for the client; must point at `/auth/callback`.
    pub redirect_uri: String,

    /// Authorization endpoint.
    #[serde(default = "default_auth_uri")]
    pub auth_uri: String,

    /// Token endpoint.
    #[serde(default = "default_token_uri")]
    pub token_uri: String,

    /// Profile endpoint.
    #[serde(default = "default_userinfo_uri")]
    pub userinfo_uri: String,

    /// Attempts made when fetching the user profile.
    #[serde(default = "default_max_attempts")]
    pub user_info_max_attempts: u32,

    /// Per-request timeout for the profile fetch, in seconds.
    #[serde(default = "default_user_info_timeout")]
    pub user_info_timeout_secs: u64,

    /// First retry delay in milliseconds; doubles on every attempt.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,

    /// Timeout for token exchange and other OAuth requests, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Resolved client secret (populated by `resolve_env_vars`).
    #[serde(skip)]
    pub client_secret: Option<String>,
}

fn default_auth_uri() -> String {
    "https://accounts.google.com/o/oauth2/auth".into()
}
fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".into()
}
fn default_userinfo_uri() -> String {
    "https://www.googleapis.com/oauth2/v2/userinfo".into()
}
fn default_max_attempts() -> u32 {
    3
}
fn default_user_info_timeout() -> u64 {
    10
}
fn default_retry_base_delay() -> u64 {
    1000
}
fn default_request_timeout() -> u64 {
    30
}

// ---------------------------------------------------------------------------
// Sheets
// ---------------------------------------------------------------------------

/// Google Sheets source configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Spreadsheet key (the long ID in the sheet URL).
    pub spreadsheet_id: String,

    /// Worksheet title. When unset the first worksheet is used.
    #[serde(default)]
    pub worksheet: Option<String>,

    /// Sheets REST API base URL.
    #[serde(default = "default_sheets_api_url")]
    pub api_url: String,

    /// Path to a service-account key JSON file.
    #[serde(default)]
    pub service_account_key_file: Option<PathBuf>,

    /// Environment variable holding the service-account key JSON.
    #[serde(default)]
    pub service_account_key_env: Option<String>,

    /// Environment variable holding a pre-issued bearer token.
    #[serde(default)]
    pub access_token_env: Option<String>,

    /// Timeout for each Sheets API request, in seconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Resolved service-account key JSON.
    #[serde(skip)]
    pub service_account_key: Option<String>,

    /// Resolved bearer token.
    #[serde(skip)]
    pub access_token: Option<String>,
}

fn default_sheets_api_url() -> String {
    "https://sheets.googleapis.com/v4".into()
}

/// Where the Sheets client gets its credentials from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetsCredentials {
    /// Service-account key file on disk.
    KeyFile(PathBuf),
    /// Service-account key JSON held in memory.
    KeyJson(String),
    /// Static bearer token.
    AccessToken(String),
}

impl SheetsConfig {
    /// Pick the credential source. A key file wins over inline key JSON,
    /// which wins over a static token.
    pub fn credentials(&self) -> Option<SheetsCredentials> {
        if let Some(ref path) = self.service_account_key_file {
            return Some(SheetsCredentials::KeyFile(path.clone()));
        }
        if let Some(ref json) = self.service_account_key {
            return Some(SheetsCredentials::KeyJson(json.clone()));
        }
        self.access_token
            .as_ref()
            .map(|t| SheetsCredentials::AccessToken(t.clone()))
    }
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    ///
    /// This does **not** resolve environment variables -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: AppConfig =
            toml::from_str(contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Resolve all `*_env` fields from environment variables and populate the
    /// corresponding resolved fields.
    ///
    /// Fields that reference a missing variable do **not** fail here;
    /// [`validate`](Self::validate) decides what is required. The names of
    /// the unset or empty variables are returned so callers can report them
    /// before logging is configured.
    pub fn resolve_env_vars(&mut self) -> Result<Vec<String>, ConfigError> {
        info!("resolving environment variable references in config");
        let mut missing = Vec::new();

        self.oauth.client_secret = resolve_optional_env(
            &self.oauth.client_secret_env,
            "oauth.client_secret_env",
            &mut missing,
        );

        if let Some(ref env_name) = self.sheets.service_account_key_env {
            self.sheets.service_account_key =
                resolve_optional_env(env_name, "sheets.service_account_key_env", &mut missing);
        }

        if let Some(ref env_name) = self.sheets.access_token_env {
            self.sheets.access_token =
                resolve_optional_env(env_name, "sheets.access_token_env", &mut missing);
        }

        debug!(missing = missing.len(), "environment variable resolution complete");
        Ok(missing)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sheets.spreadsheet_id.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sheets.spreadsheet_id".into(),
                detail: "spreadsheet ID must not be empty".into(),
            });
        }
        if self.sheets.credentials().is_none() {
            return Err(ConfigError::InvalidValue {
                field: "sheets".into(),
                detail: "one of service_account_key_file, service_account_key_env or \
                         access_token_env must provide credentials"
                    .into(),
            });
        }
        if self.oauth.client_id.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "oauth.client_id".into(),
                detail: "OAuth client ID must not be empty".into(),
            });
        }
        if self.oauth.client_secret.is_none() {
            return Err(ConfigError::InvalidValue {
                field: "oauth.client_secret_env".into(),
                detail: format!(
                    "environment variable '{}' must hold the OAuth client secret",
                    self.oauth.client_secret_env
                ),
            });
        }
        if self.oauth.redirect_uri.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "oauth.redirect_uri".into(),
                detail: "OAuth redirect URI must not be empty".into(),
            });
        }
        if self.oauth.user_info_max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "oauth.user_info_max_attempts".into(),
                detail: "at least one attempt is required".into(),
            });
        }
        if self.server.listen.parse::<SocketAddr>().is_err() {
            return Err(ConfigError::InvalidValue {
                field: "server.listen".into(),
                detail: format!("'{}' is not a socket address", self.server.listen),
            });
        }
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&self.server.session_ttl_hours) {
            return Err(ConfigError::InvalidValue {
                field: "server.session_ttl_hours".into(),
                detail: format!(
                    "session TTL must be between 1 and {} hours",
                    MAX_SESSION_TTL_HOURS
                ),
            });
        }

        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

/// Try to read an environment variable by name. Returns `Some(value)` on
/// success; otherwise logs a warning, records `env_name` in `missing`, and
/// returns `None`.
fn resolve_optional_env(env_name: &str, field: &str, missing: &mut Vec<String>) -> Option<String> {
    match std::env::var(env_name) {
        Ok(val) if !val.is_empty() => {
            debug!(field, env_name, "resolved env var");
            return Some(val);
        }
        Ok(_) => warn!(field, env_name, "env var is set but empty"),
        Err(_) => warn!(field, env_name, "env var not set"),
    }
    missing.push(env_name.to_string());
    None
}
