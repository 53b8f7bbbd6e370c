//! Student gradebook core library.
//!
//! This crate provides configuration, error types, the grade data model,
//! the identity resolver that maps a signed-in email to a spreadsheet row,
//! and the Google OAuth and Sheets clients.

pub mod cards;
pub mod config;
pub mod errors;
pub mod google;
pub mod gradebook;
pub mod identity;
pub mod models;

// Re-exports for convenience.
pub use config::AppConfig;
pub use gradebook::Gradebook;
pub use models::{CellValue, GradeRow, GradeTable, StudentGrades, UserInfo};
