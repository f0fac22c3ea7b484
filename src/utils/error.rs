//! Error types for the pinglun crawler
//!
//! Page-level failures are split into fetch and parse errors so the
//! orchestrator can decide whether a page loop continues or stops.

use thiserror::Error;

/// Errors that can occur while talking to an upstream source
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP transport error (connection refused, reset, TLS, ...)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Request timeout
    #[error("Request timeout")]
    Timeout,

    /// Non-success HTTP status
    #[error("Server error: {0}")]
    ServerError(u16),

    /// Upstream answered with a non-zero API error code
    #[error("Provider error {code}: {message}")]
    Provider { code: i64, message: String },

    /// Response body could not be read
    #[error("Decoding error: {0}")]
    Decode(String),

    /// Credential token missing for a source that requires it
    #[error("Missing credential for {0}")]
    MissingCredential(&'static str),
}

impl FetchError {
    /// Classify a reqwest error, separating timeouts from other transport failures
    pub fn from_transport(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(err)
        }
    }
}

/// Errors that can occur while parsing a response body
#[derive(Error, Debug)]
pub enum ParseError {
    /// JSON body did not match the expected shape
    #[error("Unexpected JSON shape: {0}")]
    Json(#[from] serde_json::Error),

    /// HTML document lacked the expected structure
    #[error("Unexpected HTML shape: {0}")]
    Html(String),

    /// A required field was absent
    #[error("Missing field: {0}")]
    MissingField(&'static str),

    /// A field was present but not in the expected format
    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },
}

/// General crawler errors
#[derive(Error, Debug)]
pub enum CrawlerError {
    /// Fetch error
    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
}

impl From<reqwest::Error> for CrawlerError {
    fn from(err: reqwest::Error) -> Self {
        Self::Fetch(FetchError::from_transport(err))
    }
}

impl From<serde_json::Error> for CrawlerError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(ParseError::Json(err))
    }
}
