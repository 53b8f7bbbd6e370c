//! Server-rendered HTML pages: the login screen and the grade dashboard.

use std::fmt::Write;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::warn;

use gradebook_core::cards::{grade_cards, layout_columns, GradeCard, CARD_COLUMNS};
use gradebook_core::errors::CoreError;

use crate::session::{current_session, Session};
use crate::AppState;

const PAGE_TITLE: &str = "Student Gradebook";

const STYLE: &str = "\
body{font-family:sans-serif;margin:2rem auto;max-width:60rem;padding:0 1rem}\
.notice{padding:.75rem 1rem;border-radius:4px;margin:1rem 0}\
.error{background:#fde8e8;color:#9b1c1c}\
.info{background:#e8f0fd;color:#1c3d9b}\
.profile{display:flex;gap:1.5rem;align-items:center}\
.profile img{width:100px;border-radius:50%}\
.grid{display:grid;grid-template-columns:repeat(3,1fr);gap:1rem}\
.card{border:1px solid #ddd;border-radius:6px;padding:.75rem;margin-bottom:1rem}\
.card h3{text-align:center;margin:.5rem 0 0}\
.green{color:green}.orange{color:orange}.red{color:red}.blue{color:blue}";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/", get(index))
}

async fn index(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(session) = current_session(&state, &headers).await else {
        return Html(login_page(None)).into_response();
    };

    match state.gradebook.grades_for(&session.user.email).await {
        Ok(grades) => {
            let cards = grade_cards(&grades.row);
            Html(dashboard_page(&session, Some(&cards), None)).into_response()
        }
        Err(CoreError::Lookup(e)) => (
            StatusCode::NOT_FOUND,
            Html(dashboard_page(&session, None, Some(&e.to_string()))),
        )
            .into_response(),
        Err(e) => {
            warn!(error = %e, "failed to load grades for dashboard");
            (
                StatusCode::BAD_GATEWAY,
                Html(dashboard_page(
                    &session,
                    None,
                    Some(&format!("Error fetching grades: {}", e)),
                )),
            )
                .into_response()
        }
    }
}

/// Escape text for use in HTML element content and quoted attributes.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title}</title>\n<style>{style}</style>\n</head>\n<body>\n\
         <h1>{title}</h1>\n{body}</body>\n</html>\n",
        title = PAGE_TITLE,
        style = STYLE,
        body = body
    )
}

fn notice(buf: &mut String, class: &str, message: &str) {
    let _ = writeln!(
        buf,
        "<div class=\"notice {}\">{}</div>",
        class,
        escape_html(message)
    );
}

/// Login screen, optionally with an error message from a failed attempt.
pub fn login_page(error: Option<&str>) -> String {
    let mut body = String::new();
    if let Some(message) = error {
        notice(&mut body, "error", message);
    }
    body.push_str(
        "<p>Please login with your Google account to view your grades.</p>\n\
         <p><a class=\"login\" href=\"/auth/login\">Login with Google</a></p>\n\
         <form method=\"post\" action=\"/auth/manual\">\n\
         <p>After authorization, you'll be redirected to a URL. If automatic detection \
         doesn't work, paste the full URL here:</p>\n\
         <label>Redirect URL: <input type=\"url\" name=\"redirect_url\" size=\"80\"></label>\n\
         <button type=\"submit\">Continue</button>\n\
         </form>\n",
    );
    page(&body)
}

/// Dashboard for a signed-in student. `cards` is `None` when the grades
/// could not be shown, in which case `message` says why.
pub fn dashboard_page(
    session: &Session,
    cards: Option<&[GradeCard]>,
    message: Option<&str>,
) -> String {
    let user = &session.user;
    let mut body = String::new();

    body.push_str("<div class=\"profile\">\n");
    if let Some(picture) = user.picture.as_deref().filter(|p| !p.is_empty()) {
        let _ = writeln!(
            body,
            "<img src=\"{}\" alt=\"profile picture\">",
            escape_html(picture)
        );
    }
    let _ = writeln!(
        body,
        "<div><h2>Welcome, {}!</h2>\n<p>Email: {}</p>\n<p>Student ID: {}</p></div>",
        escape_html(user.display_name()),
        escape_html(&user.email),
        escape_html(&session.student_id)
    );
    body.push_str("</div>\n");

    if let Some(message) = message {
        notice(&mut body, "error", message);
    }

    if let Some(cards) = cards {
        body.push_str("<h2>Your Grades</h2>\n");
        if cards.is_empty() {
            notice(&mut body, "info", "No grades have been entered yet.");
        } else {
            body.push_str("<div class=\"grid\">\n");
            for column in layout_columns(cards, CARD_COLUMNS) {
                body.push_str("<div class=\"column\">\n");
                for card in column {
                    let _ = writeln!(
                        body,
                        "<div class=\"card\"><strong>{}</strong><h3 class=\"{}\">{}</h3></div>",
                        escape_html(&card.subject),
                        card.band,
                        escape_html(&card.grade)
                    );
                }
                body.push_str("</div>\n");
            }
            body.push_str("</div>\n");
        }
    }

    body.push_str(
        "<form method=\"post\" action=\"/auth/logout\"><button type=\"submit\">Logout</button></form>\n",
    );
    page(&body)
}
