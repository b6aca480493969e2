//! Error types for the Eventbrite scraper
//!
//! This module defines all error types used throughout the library.
//! Nothing is retried or suppressed internally: every variant reaches the
//! caller as soon as it occurs.

use thiserror::Error;

/// Error type for Eventbrite scraper operations
#[derive(Error, Debug)]
pub enum EventbriteError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Expected markup, script block or form field is absent, or the server
    /// answered 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// Embedded JSON or an upstream value could not be parsed
    #[error("Parse error: {message}")]
    Parse {
        /// Parser error message
        message: String,
        /// Raw text that failed to parse
        raw: String,
    },

    /// A required upstream key is absent during normalization
    #[error("Missing field: {0}")]
    MissingField(String),

    /// Misconfigured interval or malformed argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The internal API only serves page 2 onwards
    #[error("Unsupported page for API fetch: {0} (must be at least 2)")]
    UnsupportedPage(u32),

    /// Upstream timezone name is not a known IANA zone
    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    /// Rate limited by the server (HTTP 429)
    #[error("Rate limited - too many requests")]
    RateLimited,

    /// Event record could not be converted to JSON
    #[error("JSON conversion failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for Eventbrite scraper operations
pub type Result<T> = std::result::Result<T, EventbriteError>;
