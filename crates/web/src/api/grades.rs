//! JSON endpoints for the signed-in student.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use gradebook_core::cards::{grade_cards, GradeCard};
use gradebook_core::models::GradeRow;

use crate::api::status::AppError;
use crate::session::require_session;
use crate::AppState;

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct MeResponse {
    email: String,
    name: String,
    picture: Option<String>,
    student_id: String,
    expires_at: String,
}

#[derive(Serialize)]
struct GradesResponse {
    student_id: String,
    grades: GradeRow,
    cards: Vec<GradeCard>,
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(me))
        .route("/api/grades", get(grades))
}

async fn me(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<MeResponse>, AppError> {
    let session = require_session(&state, &headers).await?;
    Ok(Json(MeResponse {
        name: session.user.display_name().to_string(),
        email: session.user.email,
        picture: session.user.picture,
        student_id: session.student_id,
        expires_at: session.expires_at.to_rfc3339(),
    }))
}

async fn grades(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<Json<GradesResponse>, AppError> {
    let session = require_session(&state, &headers).await?;
    let found = state.gradebook.grades_for(&session.user.email).await?;
    let cards = grade_cards(&found.row);
    Ok(Json(GradesResponse {
        student_id: found.student_id,
        grades: found.row,
        cards,
    }))
}
