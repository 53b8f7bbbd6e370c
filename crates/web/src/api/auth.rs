//! Google sign-in endpoints.
//!
//! `/auth/login` sends the student to Google, `/auth/callback` receives the
//! authorization code, and `/auth/manual` accepts a pasted redirect URL when
//! the automatic redirect does not reach the server.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::header::SET_COOKIE;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Router};
use serde::Deserialize;
use tracing::{info, warn};

use gradebook_core::errors::{AuthError, LookupError};
use gradebook_core::google::extract_auth_code;
use gradebook_core::identity::student_id_from_email;

use crate::pages::login_page;
use crate::session::{
    begin_login, create_session, end_session, expired_cookie, finish_login, session_cookie,
    session_ttl,
};
use crate::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ManualForm {
    pub redirect_url: String,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/login", get(login))
        .route("/auth/callback", get(callback))
        .route("/auth/manual", post(manual))
        .route("/auth/logout", post(logout))
}

async fn login(State(state): State<Arc<AppState>>) -> Redirect {
    let login_state = begin_login(&state).await;
    info!("redirecting to Google for authorization");
    Redirect::to(&state.oauth.authorization_url(&login_state))
}

async fn callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Response {
    if let Some(error) = params.error {
        warn!(error = %error, "authorization denied by user or provider");
        return auth_failure(AuthError::Denied(error));
    }
    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        return auth_failure(AuthError::MissingCode("callback has no code parameter".into()));
    };
    complete_login(&state, &code, params.state.as_deref()).await
}

async fn manual(State(state): State<Arc<AppState>>, Form(form): Form<ManualForm>) -> Response {
    match extract_auth_code(&form.redirect_url) {
        Some(auth) => complete_login(&state, &auth.code, auth.state.as_deref()).await,
        None => auth_failure(AuthError::MissingCode(
            "could not extract authorization code from the URL".into(),
        )),
    }
}

async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    end_session(&state, &headers).await;
    ([(SET_COOKIE, expired_cookie())], Redirect::to("/")).into_response()
}

/// Verify `state`, exchange the code, and open a session.
async fn complete_login(state: &Arc<AppState>, code: &str, login_state: Option<&str>) -> Response {
    let state_ok = match login_state {
        Some(s) => finish_login(state, s).await,
        None => false,
    };
    if !state_ok {
        warn!("login state missing or unknown");
        return auth_failure(AuthError::StateMismatch);
    }

    let user = match state.oauth.sign_in(code).await {
        Ok(user) => user,
        Err(e) => return auth_failure(e),
    };

    let Some(student_id) = student_id_from_email(&user.email).map(str::to_string) else {
        let err = LookupError::MalformedEmail(user.email.clone());
        warn!(error = %err, "signed-in account has no student ID");
        return (StatusCode::FORBIDDEN, Html(login_page(Some(&err.to_string())))).into_response();
    };

    let token = create_session(state, user, student_id).await;
    let cookie = session_cookie(&token, session_ttl(state), state.config.server.cookie_secure);
    ([(SET_COOKIE, cookie)], Redirect::to("/")).into_response()
}

fn auth_failure(err: AuthError) -> Response {
    warn!(error = %err, "sign-in failed");
    (
        StatusCode::UNAUTHORIZED,
        Html(login_page(Some(&err.to_string()))),
    )
        .into_response()
}
