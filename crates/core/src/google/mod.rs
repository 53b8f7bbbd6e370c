//! Clients for the two Google collaborators.
//!
//! - [`oauth`]: the web-server OAuth flow that signs a student in and reads
//!   their profile.
//! - [`sheets`]: the read-only Sheets client that fetches the grade table
//!   with service-account credentials.

pub mod oauth;
pub mod sheets;

pub use oauth::{extract_auth_code, AuthCode, OAuthClient, RetryPolicy, TokenResponse};
pub use sheets::{records_from_values, SheetsClient};

/// `User-Agent` sent on every Google request.
pub(crate) const USER_AGENT: &str = concat!("gradebook/", env!("CARGO_PKG_VERSION"));
