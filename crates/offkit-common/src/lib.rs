//! # OffKit Common
//!
//! Common utilities, error types, and logging configuration for the OffKit
//! offline cache manager.
//!
//! ## Features
//!
//! - Unified error type shared across the workspace
//! - Logging configuration and setup
//! - Result and Option extension traits

use thiserror::Error;

pub mod logging;

pub use logging::{init_logging, try_init_logging, LogConfig, LogFormat};

/// Unified error type for OffKit.
#[derive(Error, Debug)]
pub enum OffkitError {
    /// Configuration or manifest errors.
    #[error("Config error: {0}")]
    Config(String),

    /// Network-related errors.
    #[error("Network error: {0}")]
    Network(String),

    /// Cache storage errors.
    #[error("Cache error: {0}")]
    Cache(String),

    /// Lifecycle state errors.
    #[error("State error: {0}")]
    State(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// IO errors.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// URL errors.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl OffkitError {
    /// Create a config error.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a network error.
    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Create a cache error.
    pub fn cache(msg: impl Into<String>) -> Self {
        Self::Cache(msg.into())
    }

    /// Create a state error.
    pub fn state(msg: impl Into<String>) -> Self {
        Self::State(msg.into())
    }

    /// Get the error category for log labels.
    pub fn category(&self) -> &'static str {
        match self {
            OffkitError::Config(_) => "config",
            OffkitError::Network(_) => "network",
            OffkitError::Cache(_) => "cache",
            OffkitError::State(_) => "state",
            OffkitError::NotFound(_) => "not_found",
            OffkitError::InvalidArgument(_) => "invalid_argument",
            OffkitError::Io(_) => "io",
            OffkitError::Url(_) => "url",
            OffkitError::Other(_) => "other",
        }
    }
}

/// Result type alias for OffKit operations.
pub type Result<T> = std::result::Result<T, OffkitError>;

/// Extension trait for Option.
pub trait OptionExt<T> {
    /// Convert None to a NotFound error.
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_not_found(self, resource: impl Into<String>) -> Result<T> {
        self.ok_or_else(|| OffkitError::NotFound(resource.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_categories() {
        assert_eq!(OffkitError::config("test").category(), "config");
        assert_eq!(OffkitError::network("test").category(), "network");
        assert_eq!(OffkitError::cache("test").category(), "cache");
        assert_eq!(OffkitError::NotFound("x".into()).category(), "not_found");
    }

    #[test]
    fn test_error_display() {
        let err = OffkitError::state("worker not installed");
        assert_eq!(err.to_string(), "State error: worker not installed");
    }

    #[test]
    fn test_option_ext() {
        let some: Option<i32> = Some(42);
        assert_eq!(some.ok_or_not_found("test").unwrap(), 42);

        let none: Option<i32> = None;
        assert!(matches!(
            none.ok_or_not_found("test"),
            Err(OffkitError::NotFound(_))
        ));
    }

    #[test]
    fn test_url_error_conversion() {
        let parse_err = url::Url::parse("not a url").unwrap_err();
        let err: OffkitError = parse_err.into();
        assert_eq!(err.category(), "url");
    }
}
