//! End-to-end tests for sign-in and grade lookup.
//!
//! These tests run the real router against a local stand-in for Google:
//! - token endpoint: code `code-<id>` yields token `tok-<id>`, code `used`
//!   is rejected with `invalid_grant`
//! - userinfo endpoint: token `tok-<id>` belongs to `<id>@gmail.com`; tokens
//!   starting with `flaky-` fail once with 503 first
//! - Sheets endpoints serving one worksheet named `Grades`, as display text
//!
//! No network I/O leaves the loopback interface.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use reqwest::redirect::Policy;
use reqwest::Url;
use serde_json::json;

use gradebook_core::config::AppConfig;
use gradebook_core::google::{OAuthClient, SheetsClient};
use gradebook_core::Gradebook;
use gradebook_web::WebServer;

// ===========================================================================
// Fake Google
// ===========================================================================

#[derive(Default)]
struct FakeGoogle {
    /// Tokens that already failed once.
    flaked: Mutex<HashSet<String>>,
    userinfo_calls: Mutex<usize>,
}

async fn token_endpoint(Form(form): Form<HashMap<String, String>>) -> impl IntoResponse {
    assert_eq!(form.get("grant_type").map(String::as_str), Some("authorization_code"));
    assert_eq!(form.get("client_secret").map(String::as_str), Some("test-secret"));

    let code = form.get("code").cloned().unwrap_or_default();
    if code == "used" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "invalid_grant", "error_description": "Bad Request" })),
        );
    }
    let token = match code.strip_prefix("code-") {
        Some(id) => format!("tok-{}", id),
        None => code,
    };
    (
        StatusCode::OK,
        Json(json!({ "access_token": token, "expires_in": 3599, "token_type": "Bearer" })),
    )
}

async fn userinfo_endpoint(
    State(fake): State<Arc<FakeGoogle>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    *fake.userinfo_calls.lock().unwrap() += 1;
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .unwrap_or_default()
        .to_string();

    if token.starts_with("flaky-") && fake.flaked.lock().unwrap().insert(token.clone()) {
        return (StatusCode::SERVICE_UNAVAILABLE, Json(json!({ "error": "busy" })));
    }
    if token == "forbidden" {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "nope" })));
    }

    let id = token
        .strip_prefix("tok-")
        .or_else(|| token.strip_prefix("flaky-"))
        .unwrap_or(&token);
    let email = if id == "noat" {
        "weird-email".to_string()
    } else {
        format!("{}@gmail.com", id)
    };
    (
        StatusCode::OK,
        Json(json!({
            "email": email,
            "name": "Ada Student",
            "picture": "https://example.com/ada.png",
            "verified_email": true
        })),
    )
}

async fn sheet_metadata(Path(id): Path<String>, headers: HeaderMap) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "denied" })));
    }
    if id != "sheet-1" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "missing" })));
    }
    (
        StatusCode::OK,
        Json(json!({ "sheets": [
            { "properties": { "title": "Grades" } },
            { "properties": { "title": "Archive" } }
        ]})),
    )
}

async fn sheet_values(
    Path((id, range)): Path<(String, String)>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    assert_eq!(
        params.get("valueRenderOption").map(String::as_str),
        Some("FORMATTED_VALUE")
    );
    if !authorized(&headers) {
        return (StatusCode::FORBIDDEN, Json(json!({ "error": "denied" })));
    }
    if id != "sheet-1" || range != "'Grades'" {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "missing" })));
    }
    (
        StatusCode::OK,
        Json(json!({
            "range": "Grades!A1:D5",
            "majorDimension": "ROWS",
            "values": [
                ["ID", "Math", "Science", "Art"],
                ["1801", "90", "72.5", "A+"],
                ["1802", "85", "60"],
                ["01803", "99", "99", "99"],
                ["1804", "90%", "3/14/2024", "TRUE"]
            ]
        })),
    )
}

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|h| h == "Bearer sheets-token")
        .unwrap_or(false)
}

async fn spawn(router: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

// ===========================================================================
// Helpers
// ===========================================================================

struct Harness {
    base: String,
    client: reqwest::Client,
    fake: Arc<FakeGoogle>,
}

async fn start(spreadsheet_id: &str) -> Harness {
    let fake = Arc::new(FakeGoogle::default());
    let google = Router::new()
        .route("/token", post(token_endpoint))
        .route("/userinfo", get(userinfo_endpoint))
        .route("/v4/spreadsheets/:id", get(sheet_metadata))
        .route("/v4/spreadsheets/:id/values/:range", get(sheet_values))
        .with_state(fake.clone());
    let google_addr = spawn(google).await;

    let toml_str = format!(
        r#"
[server]
listen = "127.0.0.1:0"

[oauth]
client_id = "test-client"
client_secret_env = "GRADEBOOK_TEST_UNUSED"
redirect_uri = "http://localhost/auth/callback"
auth_uri = "http://{g}/auth"
token_uri = "http://{g}/token"
userinfo_uri = "http://{g}/userinfo"
retry_base_delay_ms = 1

[sheets]
spreadsheet_id = "{sheet}"
api_url = "http://{g}/v4"
"#,
        g = google_addr,
        sheet = spreadsheet_id
    );
    let mut config = AppConfig::from_toml_str(&toml_str).unwrap();
    config.oauth.client_secret = Some("test-secret".into());
    config.sheets.access_token = Some("sheets-token".into());
    config.validate().unwrap();

    let oauth = OAuthClient::new(&config.oauth).unwrap();
    let sheets = SheetsClient::from_config(&config.sheets).await.unwrap();
    let server = WebServer::new(config, oauth, Gradebook::new(sheets));
    let app_addr = spawn(server.router()).await;

    let client = reqwest::Client::builder()
        .redirect(Policy::none())
        .build()
        .unwrap();

    Harness {
        base: format!("http://{}", app_addr),
        client,
        fake,
    }
}

impl Harness {
    /// Begin a login and return the `state` Google would echo back.
    async fn login_state(&self) -> String {
        let resp = self
            .client
            .get(format!("{}/auth/login", self.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
        let location = resp.headers()["location"].to_str().unwrap().to_string();
        let url = Url::parse(&location).unwrap();
        url.query_pairs()
            .find(|(k, _)| k == "state")
            .map(|(_, v)| v.into_owned())
            .expect("authorization URL has a state")
    }

    async fn callback(&self, code: &str, state: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/auth/callback", self.base))
            .query(&[("code", code), ("state", state)])
            .send()
            .await
            .unwrap()
    }

    /// Full sign-in; returns the session token.
    async fn sign_in(&self, code: &str) -> String {
        let state = self.login_state().await;
        let resp = self.callback(code, &state).await;
        assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
        session_from(&resp).expect("session cookie set")
    }

    async fn get_with_token(&self, path: &str, token: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.base, path))
            .header("cookie", format!("gradebook_session={}", token))
            .send()
            .await
            .unwrap()
    }
}

fn session_from(resp: &reqwest::Response) -> Option<String> {
    resp.headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|c| c.strip_prefix("gradebook_session="))
        .and_then(|rest| rest.split(';').next())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
}

// ===========================================================================
// Tests
// ===========================================================================

#[tokio::test]
async fn test_health() {
    let h = start("sheet-1").await;
    let resp = h
        .client
        .get(format!("{}/api/status/health", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_login_page_when_signed_out() {
    let h = start("sheet-1").await;
    let resp = h.client.get(&h.base).send().await.unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let html = resp.text().await.unwrap();
    assert!(html.contains("Login with Google"));
}

#[tokio::test]
async fn test_authorization_redirect() {
    let h = start("sheet-1").await;
    let resp = h
        .client
        .get(format!("{}/auth/login", h.base))
        .send()
        .await
        .unwrap();
    let location = resp.headers()["location"].to_str().unwrap();
    assert!(location.contains("/auth?"));
    assert!(location.contains("client_id=test-client"));
    assert!(location.contains("access_type=offline"));
}

#[tokio::test]
async fn test_full_sign_in_and_dashboard() {
    let h = start("sheet-1").await;
    let token = h.sign_in("code-1801").await;

    let resp = h.get_with_token("/", &token).await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let html = resp.text().await.unwrap();
    assert!(html.contains("Welcome, Ada Student!"));
    assert!(html.contains("Student ID: 1801"));
    assert!(html.contains("<h3 class=\"green\">90</h3>"));
    assert!(html.contains("<h3 class=\"orange\">72.5</h3>"));
    assert!(html.contains("<h3 class=\"blue\">A+</h3>"));
}

#[tokio::test]
async fn test_grades_api() {
    let h = start("sheet-1").await;
    let token = h.sign_in("code-1802").await;

    let resp = h
        .client
        .get(format!("{}/api/grades", h.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["student_id"], "1802");
    assert_eq!(body["grades"]["ID"], "1802");
    assert_eq!(body["grades"]["Math"], "85");
    assert!(body["grades"]["Art"].is_null());
    assert_eq!(body["cards"][1]["subject"], "Science");
    assert_eq!(body["cards"][1]["band"], "red");
    assert_eq!(body["cards"][2]["band"], "blue");
}

#[tokio::test]
async fn test_formatted_cells_shown_as_in_sheet() {
    let h = start("sheet-1").await;
    let token = h.sign_in("code-1804").await;

    let resp = h.get_with_token("/", &token).await;
    assert_eq!(resp.status(), reqwest::StatusCode::OK);
    let html = resp.text().await.unwrap();
    assert!(html.contains("<h3 class=\"blue\">90%</h3>"));
    assert!(html.contains("<h3 class=\"blue\">3/14/2024</h3>"));
    assert!(html.contains("<h3 class=\"blue\">TRUE</h3>"));
}

#[tokio::test]
async fn test_me_endpoint() {
    let h = start("sheet-1").await;
    let token = h.sign_in("code-1801").await;

    let resp = h.get_with_token("/api/me", &token).await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["email"], "1801@gmail.com");
    assert_eq!(body["student_id"], "1801");
    assert_eq!(body["name"], "Ada Student");
}

#[tokio::test]
async fn test_student_without_row() {
    let h = start("sheet-1").await;
    // "01803" is in the sheet but "1803" is not: matching is exact.
    let token = h.sign_in("code-1803").await;

    let resp = h.get_with_token("/api/grades", &token).await;
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "no records found for student ID: 1803");

    let resp = h.get_with_token("/", &token).await;
    assert_eq!(resp.status(), reqwest::StatusCode::NOT_FOUND);
    assert!(resp.text().await.unwrap().contains("no records found for student ID: 1803"));
}

#[tokio::test]
async fn test_state_mismatch_rejected() {
    let h = start("sheet-1").await;
    let _ = h.login_state().await;
    let resp = h.callback("code-1801", "forged-state").await;
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert!(session_from(&resp).is_none());
}

#[tokio::test]
async fn test_state_is_single_use() {
    let h = start("sheet-1").await;
    let state = h.login_state().await;
    assert_eq!(
        h.callback("code-1801", &state).await.status(),
        reqwest::StatusCode::SEE_OTHER
    );
    assert_eq!(
        h.callback("code-1801", &state).await.status(),
        reqwest::StatusCode::UNAUTHORIZED
    );
}

#[tokio::test]
async fn test_expired_code() {
    let h = start("sheet-1").await;
    let state = h.login_state().await;
    let resp = h.callback("used", &state).await;
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    let html = resp.text().await.unwrap();
    assert!(html.contains("expired or already been used"));
}

#[tokio::test]
async fn test_consent_denied() {
    let h = start("sheet-1").await;
    let resp = h
        .client
        .get(format!("{}/auth/callback?error=access_denied", h.base))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert!(resp.text().await.unwrap().contains("access_denied"));
}

#[tokio::test]
async fn test_email_without_at_is_refused() {
    let h = start("sheet-1").await;
    let state = h.login_state().await;
    let resp = h.callback("code-noat", &state).await;
    assert_eq!(resp.status(), reqwest::StatusCode::FORBIDDEN);
    assert!(session_from(&resp).is_none());
}

#[tokio::test]
async fn test_user_info_retries_transient_failure() {
    let h = start("sheet-1").await;
    let token = h.sign_in("flaky-1801").await;
    assert_eq!(*h.fake.userinfo_calls.lock().unwrap(), 2);

    let resp = h.get_with_token("/api/me", &token).await;
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["student_id"], "1801");
}

#[tokio::test]
async fn test_user_info_client_error_not_retried() {
    let h = start("sheet-1").await;
    let state = h.login_state().await;
    let resp = h.callback("forbidden", &state).await;
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert_eq!(*h.fake.userinfo_calls.lock().unwrap(), 1);
}

#[tokio::test]
async fn test_manual_redirect_url() {
    let h = start("sheet-1").await;
    let state = h.login_state().await;
    let pasted = format!("http://localhost/auth/callback?state={}&code=code-1801", state);
    let resp = h
        .client
        .post(format!("{}/auth/manual", h.base))
        .form(&[("redirect_url", pasted.as_str())])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    assert!(session_from(&resp).is_some());
}

#[tokio::test]
async fn test_manual_redirect_url_without_code() {
    let h = start("sheet-1").await;
    let resp = h
        .client
        .post(format!("{}/auth/manual", h.base))
        .form(&[("redirect_url", "http://localhost/auth/callback?state=x")])
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    assert!(resp
        .text()
        .await
        .unwrap()
        .contains("could not extract authorization code"));
}

#[tokio::test]
async fn test_logout_ends_session() {
    let h = start("sheet-1").await;
    let token = h.sign_in("code-1801").await;

    let resp = h
        .client
        .post(format!("{}/auth/logout", h.base))
        .header("cookie", format!("gradebook_session={}", token))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), reqwest::StatusCode::SEE_OTHER);
    let cleared = resp
        .headers()
        .get("set-cookie")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cleared.contains("Max-Age=0"));

    let resp = h.get_with_token("/api/me", &token).await;
    assert_eq!(resp.status(), reqwest::StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "not signed in or session expired");
}

#[tokio::test]
async fn test_missing_spreadsheet_surfaces_fetch_error() {
    let h = start("no-such-sheet").await;
    let token = h.sign_in("code-1801").await;

    let resp = h.get_with_token("/api/grades", &token).await;
    assert_eq!(resp.status(), reqwest::StatusCode::BAD_GATEWAY);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("not found"));
}
