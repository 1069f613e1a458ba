//! Subscriber setup for binaries and test harnesses.
//!
//! The library only emits `tracing` events. Call [`init`] once from a
//! binary or test `main` to print them. Output goes to stderr.

use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

/// Environment variable read for the filter directive
pub const LOG_ENV: &str = "REMENDAR_LOG";

/// Filter used when [`LOG_ENV`] is unset or invalid
pub const DEFAULT_DIRECTIVE: &str = "remendar=info";

/// Output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Pretty,
    /// One JSON object per event
    Json,
}

/// Filter from [`LOG_ENV`], falling back to [`DEFAULT_DIRECTIVE`]
#[must_use]
pub fn env_filter() -> EnvFilter {
    env_filter_or(DEFAULT_DIRECTIVE)
}

/// Filter from [`LOG_ENV`], falling back to `directive`
#[must_use]
pub fn env_filter_or(directive: &str) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(directive))
}

/// Install a global subscriber.
///
/// Returns `false` when one is already installed, which is normal when
/// several tests call this.
pub fn init(format: LogFormat) -> bool {
    init_with(format, DEFAULT_DIRECTIVE)
}

/// Like [`init`], with a different fallback directive (binaries map `-v`
/// flags onto it)
pub fn init_with(format: LogFormat, directive: &str) -> bool {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter_or(directive))
        .with_writer(std::io::stderr)
        .with_target(true);
    match format {
        LogFormat::Pretty => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    }
}
