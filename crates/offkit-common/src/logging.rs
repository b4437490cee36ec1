//! Logging configuration and setup.
//!
//! The worker logs lifecycle and fetch activity through `tracing`; embedding
//! hosts that have no subscriber of their own call [`init_logging`] once at
//! startup.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::{OffkitError, Result};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format.
    #[default]
    Pretty,
    /// Compact single-line format.
    Compact,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directives, e.g. "offkit=debug,reqwest=warn". The `RUST_LOG`
    /// environment variable takes precedence when set.
    pub filter: String,
    /// Output format.
    pub format: LogFormat,
    /// Include source file location.
    pub include_location: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            filter: "offkit=info".to_string(),
            format: LogFormat::Pretty,
            include_location: false,
        }
    }
}

impl LogConfig {
    /// Configuration for debugging a worker: everything the offkit crates
    /// emit, with source locations.
    pub fn debug() -> Self {
        Self {
            filter: "offkit=debug".to_string(),
            include_location: true,
            ..Default::default()
        }
    }

    /// Set the filter directives.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }
}

/// Install a global subscriber for the given configuration.
///
/// Fails if a global subscriber is already set, so hosts that configure
/// tracing themselves keep their own setup.
pub fn try_init_logging(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.filter));

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location),
            )
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_target(true))
            .try_init(),
    }
    .map_err(|e| OffkitError::config(format!("logging init failed: {e}")))
}

/// Install a global subscriber, ignoring one that is already set.
pub fn init_logging(config: &LogConfig) {
    let _ = try_init_logging(config);
}
