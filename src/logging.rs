//! Logging setup for the provider.
//!
//! All logs go to **stderr** through a `tracing` subscriber. The provider's
//! `loglevel` setting picks the default verbosity; `RUST_LOG` always wins
//! when it is set.
//!
//! ```bash
//! # Show request URLs and bodies sent to GoCD
//! RUST_LOG=gocd_provider=debug ./host
//! ```

use std::fmt;
use std::str::FromStr;

use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

use crate::error::ProviderError;

/// Verbosity accepted by the provider's `loglevel` attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// The default.
    #[default]
    Info,
    /// Adds request URLs and request/response bodies.
    Debug,
    /// Everything.
    Trace,
}

impl LogLevel {
    /// The directive passed to [`EnvFilter`].
    pub fn as_filter(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    /// Whether HTTP bodies should be logged at this level.
    pub fn logs_bodies(&self) -> bool {
        *self >= LogLevel::Debug
    }
}

impl FromStr for LogLevel {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(ProviderError::Configuration(format!(
                "unknown log level '{}', expected one of error, warn, info, debug, trace",
                other
            ))),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_filter())
    }
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

fn stderr_layer<S>() -> impl tracing_subscriber::Layer<S>
where
    S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a>,
{
    tracing_fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

/// Initialize logging at `info` unless `RUST_LOG` says otherwise.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging with a custom default level.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .init();
}

/// Try to initialize logging at `info`, returning false if already initialized.
pub fn try_init_logging() -> bool {
    try_init_logging_with_default("info")
}

/// Try to initialize logging with a custom default level.
///
/// Returns `false` when a subscriber was already installed, which happens
/// when the host configures logging itself or the provider is configured twice.
pub fn try_init_logging_with_default(default_level: &str) -> bool {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(stderr_layer())
        .try_init()
        .is_ok()
}
