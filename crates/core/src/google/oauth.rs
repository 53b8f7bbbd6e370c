//! Google OAuth 2.0 web-server flow.
//!
//! Only profile scopes are requested; spreadsheet access goes through the
//! service account in [`super::sheets`].

use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info, instrument, warn};

use crate::config::OAuthConfig;
use crate::errors::{AuthError, ConfigError};
use crate::models::UserInfo;

/// Scopes requested from the student.
pub const OAUTH_SCOPES: [&str; 3] = [
    "https://www.googleapis.com/auth/userinfo.email",
    "https://www.googleapis.com/auth/userinfo.profile",
    "openid",
];

/// Status codes on which the profile fetch is retried.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Token endpoint success body.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Token endpoint error body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorBody {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

/// Bounded retry for the profile request.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub timeout: Duration,
}

impl RetryPolicy {
    /// Delay before the attempt following `attempt` (zero-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            timeout: Duration::from_secs(10),
        }
    }
}

/// Authorization code (and `state`, when present) carried by a redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthCode {
    pub code: String,
    pub state: Option<String>,
}

/// Pull the authorization code out of a pasted redirect URL.
///
/// Returns `None` if the URL does not parse or has no non-empty `code`.
pub fn extract_auth_code(url: &str) -> Option<AuthCode> {
    let parsed = Url::parse(url.trim()).ok()?;
    let mut code = None;
    let mut state = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            "code" if code.is_none() => code = Some(value.into_owned()),
            "state" if state.is_none() => state = Some(value.into_owned()),
            _ => {}
        }
    }
    code.filter(|c| !c.is_empty())
        .map(|code| AuthCode { code, state })
}

/// Client for Google's authorization, token, and userinfo endpoints.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    auth_uri: Url,
    token_uri: String,
    userinfo_uri: String,
    retry: RetryPolicy,
}

impl OAuthClient {
    pub fn new(config: &OAuthConfig) -> Result<Self, ConfigError> {
        let auth_uri = Url::parse(&config.auth_uri).map_err(|e| ConfigError::InvalidValue {
            field: "oauth.auth_uri".into(),
            detail: e.to_string(),
        })?;
        let http = reqwest::Client::builder()
            .user_agent(super::USER_AGENT)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| ConfigError::InvalidValue {
                field: "oauth".into(),
                detail: format!("failed to build HTTP client: {}", e),
            })?;

        let retry = RetryPolicy {
            max_attempts: config.user_info_max_attempts.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            timeout: Duration::from_secs(config.user_info_timeout_secs),
        };

        info!(client_id = %config.client_id, "created OAuthClient");
        Ok(Self {
            http,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            redirect_uri: config.redirect_uri.clone(),
            auth_uri,
            token_uri: config.token_uri.clone(),
            userinfo_uri: config.userinfo_uri.clone(),
            retry,
        })
    }

    /// URL the student is sent to for consent.
    pub fn authorization_url(&self, state: &str) -> String {
        let mut url = self.auth_uri.clone();
        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &OAUTH_SCOPES.join(" "))
            .append_pair("state", state)
            .append_pair("access_type", "offline")
            .append_pair("include_granted_scopes", "true");
        url.into()
    }

    /// Exchange an authorization code for an access token.
    #[instrument(skip(self, code))]
    pub async fn exchange_code(&self, code: &str) -> Result<TokenResponse, AuthError> {
        let secret = self
            .client_secret
            .as_deref()
            .ok_or(AuthError::MissingClientSecret)?;

        debug!(code_prefix = %code.chars().take(10).collect::<String>(), "exchanging authorization code");
        let resp = self
            .http
            .post(&self.token_uri)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("client_id", self.client_id.as_str()),
                ("client_secret", secret),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;

        let status = resp.status();
        if status.is_success() {
            let token: TokenResponse = resp.json().await?;
            debug!("token exchange succeeded");
            return Ok(token);
        }

        let body = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<TokenErrorBody>(&body) {
            Ok(err) if err.error == "invalid_grant" => {
                warn!("authorization code rejected as invalid_grant");
                Err(AuthError::CodeExpired)
            }
            Ok(err) => Err(AuthError::TokenExchange(format!(
                "HTTP {}: {}{}",
                status.as_u16(),
                err.error,
                err.error_description
                    .map(|d| format!(" ({})", d))
                    .unwrap_or_default()
            ))),
            Err(_) => Err(AuthError::TokenExchange(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            ))),
        }
    }

    /// Fetch the signed-in user's profile, retrying timeouts and transient
    /// server errors with exponential backoff.
    #[instrument(skip(self, access_token))]
    pub async fn fetch_user_info(&self, access_token: &str) -> Result<UserInfo, AuthError> {
        let max_attempts = self.retry.max_attempts;
        let mut last_error = String::new();

        for attempt in 0..max_attempts {
            debug!(attempt = attempt + 1, max_attempts, "requesting user info");
            let result = self
                .http
                .get(&self.userinfo_uri)
                .bearer_auth(access_token)
                .timeout(self.retry.timeout)
                .send()
                .await;

            match result {
                Ok(resp) if resp.status().is_success() => match resp.json::<UserInfo>().await {
                    Ok(user) => {
                        info!(email = %user.email, "user info retrieved");
                        return Ok(user);
                    }
                    Err(e) if e.is_timeout() => {
                        warn!(attempt = attempt + 1, "user info body timed out");
                        last_error = e.to_string();
                    }
                    Err(e) => return Err(e.into()),
                },
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let body = resp.text().await.unwrap_or_default();
                    if !RETRYABLE_STATUSES.contains(&status) {
                        warn!(status, "non-retryable user info error");
                        return Err(AuthError::UserInfo { status, body });
                    }
                    warn!(status, attempt = attempt + 1, "transient user info error");
                    last_error = format!("HTTP {}", status);
                }
                Err(e) if e.is_timeout() => {
                    warn!(attempt = attempt + 1, "user info request timed out");
                    last_error = e.to_string();
                }
                Err(e) => return Err(e.into()),
            }

            if attempt + 1 < max_attempts {
                let wait = self.retry.backoff(attempt);
                debug!(wait_ms = wait.as_millis() as u64, "retrying user info");
                tokio::time::sleep(wait).await;
            }
        }

        warn!(max_attempts, "maximum user info attempts reached");
        Err(AuthError::RetriesExhausted {
            attempts: max_attempts,
            last_error,
        })
    }

    /// Full sign-in: exchange the code, then read the profile.
    pub async fn sign_in(&self, code: &str) -> Result<UserInfo, AuthError> {
        let token = self.exchange_code(code).await?;
        let user = self.fetch_user_info(&token.access_token).await?;
        if user.email.is_empty() {
            return Err(AuthError::MissingEmail);
        }
        Ok(user)
    }
}
