//! Core identity resolution logic.
//!
//! Pure functions over an email address and an already-fetched
//! [`GradeTable`]; nothing here performs I/O.

use tracing::{debug, warn};

use crate::errors::LookupError;
use crate::models::{GradeRow, GradeTable, StudentGrades};

/// Why a lookup produced no row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotFoundReason {
    /// The email has no `@` or nothing before it.
    MalformedEmail,
    /// No row has an `ID` equal to the derived student ID.
    NoMatchingRow { student_id: String },
}

/// Outcome of resolving an email against a table.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution<'a> {
    Found(&'a GradeRow),
    NotFound(NotFoundReason),
}

/// Derive the student ID from an email address: everything before the
/// first `@`.
///
/// Returns `None` when there is no `@` or the local part is empty.
pub fn student_id_from_email(email: &str) -> Option<&str> {
    let (local_part, _domain) = email.split_once('@')?;
    if local_part.is_empty() {
        return None;
    }
    Some(local_part)
}

/// Find the first row whose `ID` equals the student ID derived from `email`.
///
/// Comparison is exact: `"1801"` does not match `"01801"` or `" 1801"`. If
/// several rows share the ID the first one wins and the rest are reported in
/// the log.
pub fn resolve<'a>(email: &str, table: &'a GradeTable) -> Resolution<'a> {
    let Some(student_id) = student_id_from_email(email) else {
        debug!(email, "email has no usable local part");
        return Resolution::NotFound(NotFoundReason::MalformedEmail);
    };

    match find_row(student_id, table) {
        Some(index) => Resolution::Found(&table[index]),
        None => Resolution::NotFound(NotFoundReason::NoMatchingRow {
            student_id: student_id.to_string(),
        }),
    }
}

/// Owned variant of [`resolve`] that consumes the table and reports misses
/// as a [`LookupError`].
pub fn resolve_student(email: &str, mut table: GradeTable) -> Result<StudentGrades, LookupError> {
    let student_id = student_id_from_email(email)
        .ok_or_else(|| LookupError::MalformedEmail(email.to_string()))?;

    let index = find_row(student_id, &table)
        .ok_or_else(|| LookupError::NotFound(student_id.to_string()))?;

    Ok(StudentGrades {
        student_id: student_id.to_string(),
        row: table.swap_remove(index),
    })
}

/// Index of the first row whose `ID` equals `student_id`.
fn find_row(student_id: &str, table: &GradeTable) -> Option<usize> {
    let mut matches = table
        .iter()
        .enumerate()
        .filter(|(_, row)| row.id().as_deref() == Some(student_id))
        .map(|(index, _)| index);

    let first = matches.next();
    match first {
        Some(_) => {
            let extra = matches.count();
            if extra > 0 {
                warn!(
                    student_id,
                    duplicates = extra,
                    "student ID appears on several rows, using the first"
                );
            }
            debug!(student_id, "matched grade row");
        }
        None => debug!(student_id, rows = table.len(), "no grade row for student"),
    }
    first
}
