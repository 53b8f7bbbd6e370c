//! HTTP endpoint modules.

pub mod auth;
pub mod grades;
pub mod status;
