//! Identity resolution: from an authenticated Google email to the student's
//! row in the grade table.
//!
//! The student ID is the local part of the email address
//! (`1801@gmail.com` -> `1801`) and is compared verbatim against the `ID`
//! column of each row.

pub mod resolver;

pub use resolver::{resolve, resolve_student, student_id_from_email, NotFoundReason, Resolution};
