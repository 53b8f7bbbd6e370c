//! The per-view lookup: fetch the table fresh, then resolve the student.

use tracing::{info, instrument};

use crate::errors::{CoreError, LookupError};
use crate::google::SheetsClient;
use crate::identity::{resolve_student, student_id_from_email};
use crate::models::StudentGrades;

/// Grade lookups backed by the spreadsheet.
pub struct Gradebook {
    sheets: SheetsClient,
}

impl Gradebook {
    pub fn new(sheets: SheetsClient) -> Self {
        Self { sheets }
    }

    /// Fetch the grade table and return the row for `email`.
    ///
    /// Malformed emails are rejected before any request is made.
    #[instrument(skip(self))]
    pub async fn grades_for(&self, email: &str) -> Result<StudentGrades, CoreError> {
        if student_id_from_email(email).is_none() {
            return Err(LookupError::MalformedEmail(email.to_string()).into());
        }

        let table = self.sheets.fetch_table().await?;
        let grades = resolve_student(email, table)?;
        info!(student_id = %grades.student_id, "resolved student grades");
        Ok(grades)
    }
}
