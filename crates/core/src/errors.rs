//! Error types for the gradebook core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Sheets(#[from] SheetsError),

    #[error(transparent)]
    Lookup(#[from] LookupError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Authentication errors
// ---------------------------------------------------------------------------

/// Failures while signing a student in with Google.
#[derive(Debug, Error)]
pub enum AuthError {
    /// The user declined consent or Google returned an `error` parameter.
    #[error("authorization was denied: {0}")]
    Denied(String),

    /// The `state` parameter did not match a pending login.
    #[error("login state is missing, expired or does not match")]
    StateMismatch,

    /// No authorization code could be found.
    #[error("no authorization code in redirect: {0}")]
    MissingCode(String),

    /// The authorization code was already exchanged or timed out.
    #[error("the authorization code has expired or already been used, please log in again")]
    CodeExpired,

    /// The token endpoint rejected the exchange.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    /// The OAuth client secret was not resolved from the environment.
    #[error("OAuth client secret is not configured")]
    MissingClientSecret,

    /// The profile endpoint returned a non-success status.
    #[error("user info request failed (HTTP {status}): {body}")]
    UserInfo { status: u16, body: String },

    /// The profile endpoint kept timing out or failing transiently.
    #[error("user info request gave up after {attempts} attempts: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: String },

    /// The profile has no email address.
    #[error("Google profile does not include an email address")]
    MissingEmail,

    /// The session is unknown or expired.
    #[error("not signed in or session expired")]
    NotSignedIn,

    /// HTTP-level transport error (network, TLS, etc.).
    #[error("OAuth HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Spreadsheet errors
// ---------------------------------------------------------------------------

/// Failures while fetching the grade table.
#[derive(Debug, Error)]
pub enum SheetsError {
    /// Service-account credentials could not be loaded or exchanged.
    #[error("spreadsheet credentials error: {0}")]
    Credentials(String),

    /// The credentials have no access to the spreadsheet.
    #[error("access to spreadsheet denied (HTTP {status})")]
    AccessDenied { status: u16 },

    /// Spreadsheet or worksheet does not exist.
    #[error("spreadsheet or worksheet not found: {0}")]
    NotFound(String),

    /// The spreadsheet contains no worksheets.
    #[error("spreadsheet has no worksheets")]
    NoWorksheet,

    /// The same column header appears twice.
    #[error("duplicate column header '{0}' in worksheet")]
    DuplicateHeader(String),

    /// The API returned another non-success status code.
    #[error("Sheets API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    /// JSON deserialization failure.
    #[error("Sheets response parse error: {0}")]
    Parse(String),

    /// HTTP-level transport error.
    #[error("Sheets HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

// ---------------------------------------------------------------------------
// Lookup errors
// ---------------------------------------------------------------------------

/// The student could not be matched to a row.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// The email has no usable local part.
    #[error("could not extract a student ID from email '{0}'")]
    MalformedEmail(String),

    /// No row carries the derived ID.
    #[error("no records found for student ID: {0}")]
    NotFound(String),
}
