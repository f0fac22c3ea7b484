//! Error classification for the pinglun crate
//!
//! The domain errors live in [`crate::utils::error`]. This module sorts
//! them into categories the page loop acts on.
//!
//! # Usage
//!
//! ```rust,ignore
//! use pinglun::error::{ErrorCategory, PinglunErrorTrait};
//!
//! match err.category() {
//!     ErrorCategory::Network => stop_loop(),
//!     _ => skip_page(),
//! }
//! ```

pub use crate::utils::error::{CrawlerError, FetchError, ParseError};

/// Common trait for all pinglun error types
pub trait PinglunErrorTrait: std::error::Error {
    /// Get the error category for handling strategies
    fn category(&self) -> ErrorCategory;
}

/// Classification of errors for handling strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connection, timeout and HTTP status failures
    Network,
    /// Malformed or unexpected JSON / HTML
    Parsing,
    /// Upstream API reported a non-zero error code
    Provider,
    /// Configuration and credential errors
    Config,
}

impl ErrorCategory {
    /// Short label used in log fields
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Parsing => "parsing",
            Self::Provider => "provider",
            Self::Config => "config",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl PinglunErrorTrait for FetchError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Provider { .. } => ErrorCategory::Provider,
            Self::MissingCredential(_) => ErrorCategory::Config,
            Self::Http(_) | Self::Timeout | Self::ServerError(_) | Self::Decode(_) => {
                ErrorCategory::Network
            }
        }
    }
}

impl PinglunErrorTrait for ParseError {
    fn category(&self) -> ErrorCategory {
        ErrorCategory::Parsing
    }
}

impl PinglunErrorTrait for CrawlerError {
    fn category(&self) -> ErrorCategory {
        match self {
            Self::Fetch(e) => e.category(),
            Self::Parse(e) => e.category(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_categories() {
        assert_eq!(FetchError::Timeout.category(), ErrorCategory::Network);
        assert_eq!(FetchError::ServerError(404).category(), ErrorCategory::Network);
        assert_eq!(
            FetchError::Decode("truncated".to_string()).category(),
            ErrorCategory::Network
        );
        let provider = FetchError::Provider {
            code: 12002,
            message: "评论区已关闭".to_string(),
        };
        assert_eq!(provider.category(), ErrorCategory::Provider);
        assert_eq!(
            FetchError::MissingCredential("bilibili").category(),
            ErrorCategory::Config
        );
    }

    #[test]
    fn test_crawler_error_delegates() {
        let err: CrawlerError = ParseError::MissingField("data").into();
        assert_eq!(err.category(), ErrorCategory::Parsing);

        let err: CrawlerError = FetchError::Timeout.into();
        assert_eq!(err.category(), ErrorCategory::Network);
    }

    #[test]
    fn test_category_labels() {
        assert_eq!(ErrorCategory::Config.to_string(), "config");
        assert_eq!(ErrorCategory::Provider.as_str(), "provider");
    }
}
