//! Tracing initialization for the DevTools binary
//!
//! Uses the standard RUST_LOG environment variable for filtering:
//! - `RUST_LOG=debug` - Set global level
//! - `RUST_LOG=devtools_archive=debug,devtools_fetch=info` - Per-crate levels
//!
//! RUST_LOG_FORMAT selects the output format:
//! - `json` - JSON formatted output
//! - `pretty` - Pretty formatted output
//! - `compact` - Compact single-line output (default)
//!
//! All log output goes to stderr so stdout stays reserved for console lines.

use crate::error::{DevToolsError, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize with the `warn` default filter
pub fn init() -> Result<()> {
    init_with_defaults("warn")
}

/// Initialize with a default filter if RUST_LOG is not set
///
/// # Arguments
/// * `default_filter` - The filter string to use if RUST_LOG is not set (e.g., "info", "debug")
pub fn init_with_defaults(default_filter: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(env_filter);
    let result = match format.as_str() {
        "json" => registry
            .with(fmt::layer().with_writer(std::io::stderr).with_ansi(false).json())
            .try_init(),
        "pretty" => registry
            .with(fmt::layer().with_writer(std::io::stderr).pretty())
            .try_init(),
        _ => registry
            .with(fmt::layer().with_writer(std::io::stderr).compact())
            .try_init(),
    };

    result.map_err(|e| DevToolsError::Config(format!("Failed to initialize tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::{debug, info_span, warn};

    #[test]
    fn test_tracing_initialization() {
        // Only one global subscriber per process; a second init must fail cleanly
        if init_with_defaults("debug").is_ok() {
            let span = info_span!("build", plugin = "Example");
            let _enter = span.enter();
            debug!("inside span");
            warn!("warning inside span");
            assert!(init().is_err());
        }
    }
}
