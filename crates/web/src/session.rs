//! Cookie sessions for signed-in students.
//!
//! A session is created after a successful Google sign-in and remembers the
//! profile and derived student ID. Grades are never stored here; every view
//! fetches them again.

use std::collections::HashMap;
use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::HeaderMap;
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use uuid::Uuid;

use gradebook_core::config::MAX_SESSION_TTL_HOURS;
use gradebook_core::errors::{AuthError, CoreError};
use gradebook_core::models::UserInfo;

use crate::api::status::AppError;
use crate::AppState;

/// Name of the session cookie.
pub const SESSION_COOKIE: &str = "gradebook_session";

/// How long a login `state` value stays valid.
pub const LOGIN_STATE_TTL_MINUTES: i64 = 10;

/// Most login `state` values kept at once. `/auth/login` needs no session,
/// so past this the value closest to expiry is dropped.
pub const MAX_PENDING_LOGINS: usize = 1024;

/// A signed-in student.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub user: UserInfo,
    pub student_id: String,
    pub expires_at: DateTime<Utc>,
}

/// Outstanding login `state` values and their expiry times.
#[derive(Debug, Default)]
pub struct PendingLogins {
    states: HashMap<String, DateTime<Utc>>,
}

impl PendingLogins {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Register `login_state` as issued at `now`.
    pub fn insert(&mut self, login_state: String, now: DateTime<Utc>) {
        self.states.retain(|_, expiry| *expiry > now);
        if self.states.len() >= MAX_PENDING_LOGINS {
            let oldest = self
                .states
                .iter()
                .min_by_key(|(_, expiry)| **expiry)
                .map(|(key, _)| key.clone());
            if let Some(key) = oldest {
                self.states.remove(&key);
                warn!(limit = MAX_PENDING_LOGINS, "pending login limit reached, dropped oldest");
            }
        }
        self.states
            .insert(login_state, now + Duration::minutes(LOGIN_STATE_TTL_MINUTES));
    }

    /// Consume `provided` if it is outstanding at `now`. Each value is
    /// accepted once.
    pub fn take(&mut self, provided: &str, now: DateTime<Utc>) -> bool {
        self.states.retain(|_, expiry| *expiry > now);
        let matched = self
            .states
            .keys()
            .find(|known| bool::from(known.as_bytes().ct_eq(provided.as_bytes())))
            .cloned();
        match matched {
            Some(key) => {
                self.states.remove(&key);
                true
            }
            None => false,
        }
    }
}

/// Session lifetime from config, clamped to what validation allows.
pub fn session_ttl(state: &AppState) -> Duration {
    Duration::hours(
        state
            .config
            .server
            .session_ttl_hours
            .clamp(1, MAX_SESSION_TTL_HOURS),
    )
}

/// Extract the session token from `Authorization: Bearer` or the cookie.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());
    if let Some(token) = bearer {
        return Some(token.to_string());
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
        .filter(|t| !t.is_empty())
}

/// `Set-Cookie` value carrying a fresh session token.
pub fn session_cookie(token: &str, ttl: Duration, secure: bool) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE,
        token,
        ttl.num_seconds()
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// `Set-Cookie` value that removes the session cookie.
pub fn expired_cookie() -> String {
    format!("{}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0", SESSION_COOKIE)
}

/// Store a new session and return its token.
pub async fn create_session(state: &Arc<AppState>, user: UserInfo, student_id: String) -> String {
    let token = Uuid::new_v4().to_string();
    let expires_at = Utc::now() + session_ttl(state);

    info!(student_id = %student_id, "student signed in");
    let mut sessions = state.sessions.write().await;
    sessions.insert(
        token.clone(),
        Session {
            user,
            student_id,
            expires_at,
        },
    );
    token
}

/// Look up the session for the request, if any.
///
/// Also opportunistically prunes expired sessions to prevent unbounded growth.
pub async fn current_session(state: &Arc<AppState>, headers: &HeaderMap) -> Option<Session> {
    let token = session_token(headers)?;
    let now = Utc::now();

    let mut sessions = state.sessions.write().await;
    sessions.retain(|_, s| s.expires_at > now);
    sessions.get(&token).cloned()
}

/// Like [`current_session`] but fails with `401` for API handlers.
pub async fn require_session(
    state: &Arc<AppState>,
    headers: &HeaderMap,
) -> Result<Session, AppError> {
    current_session(state, headers)
        .await
        .ok_or_else(|| CoreError::Auth(AuthError::NotSignedIn).into())
}

/// Remove the session belonging to the request. Returns whether one existed.
pub async fn end_session(state: &Arc<AppState>, headers: &HeaderMap) -> bool {
    let Some(token) = session_token(headers) else {
        return false;
    };
    let removed = state.sessions.write().await.remove(&token).is_some();
    debug!(removed, "session ended");
    removed
}

/// Register a login `state` value for CSRF protection and return it.
pub async fn begin_login(state: &Arc<AppState>) -> String {
    let login_state = Uuid::new_v4().simple().to_string();
    state
        .pending_logins
        .write()
        .await
        .insert(login_state.clone(), Utc::now());
    login_state
}

/// Consume a login `state` value. Each value is accepted once.
pub async fn finish_login(state: &Arc<AppState>, provided: &str) -> bool {
    state
        .pending_logins
        .write()
        .await
        .take(provided, Utc::now())
}
