//! Logging setup for Tabula.
//!
//! Library code logs through `tracing`; nothing is printed unless the
//! application installs a subscriber. With the `tracing-subscriber` feature
//! enabled, [`init`] installs one driven by environment variables.
//!
//! # Environment Variables
//!
//! - `TABULA_DEBUG=true|1|yes` - enable debug logging
//! - `TABULA_LOG_LEVEL=trace|debug|info|warn|error` - set the level explicitly
//! - `TABULA_LOG_FORMAT=json|pretty|compact` - output format (default: json)
//!
//! ```rust,no_run
//! use tabula_query::logging;
//!
//! // Call once at startup; later calls do nothing.
//! logging::init();
//! ```
//!
//! Statements are logged with their SQL and parameter count. Parameter values
//! are never logged.

use std::env;
use std::sync::Once;

static INIT: Once = Once::new();

fn debug_flag(value: Option<String>) -> bool {
    value
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes"))
        .unwrap_or(false)
}

fn level_from(level: Option<String>, debug: bool) -> &'static str {
    let fallback = if debug { "debug" } else { "warn" };
    match level.map(|l| l.trim().to_lowercase()).as_deref() {
        Some("trace") => "trace",
        Some("debug") => "debug",
        Some("info") => "info",
        Some("warn") => "warn",
        Some("error") => "error",
        _ => fallback,
    }
}

fn format_from(format: Option<String>) -> &'static str {
    match format.map(|f| f.trim().to_lowercase()).as_deref() {
        Some("pretty") => "pretty",
        Some("compact") => "compact",
        _ => "json",
    }
}

/// Check whether `TABULA_DEBUG` enables verbose logging.
#[inline]
pub fn is_debug_enabled() -> bool {
    debug_flag(env::var("TABULA_DEBUG").ok())
}

/// The level selected by `TABULA_LOG_LEVEL`, falling back on `TABULA_DEBUG`.
pub fn get_log_level() -> &'static str {
    level_from(env::var("TABULA_LOG_LEVEL").ok(), is_debug_enabled())
}

/// The format selected by `TABULA_LOG_FORMAT`.
pub fn get_log_format() -> &'static str {
    format_from(env::var("TABULA_LOG_FORMAT").ok())
}

/// Install the environment-driven subscriber.
///
/// Does nothing unless `TABULA_DEBUG` or `TABULA_LOG_LEVEL` is set, or when
/// the `tracing-subscriber` feature is disabled.
pub fn init() {
    INIT.call_once(|| {
        if !is_debug_enabled() && env::var("TABULA_LOG_LEVEL").is_err() {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = get_log_level();
            let filter = EnvFilter::try_new(format!(
                "tabula={level},tabula_query={level},tabula_sqlite={level}"
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            // A subscriber installed by the application wins.
            let installed = match get_log_format() {
                "json" => registry.with(fmt::layer().json()).try_init(),
                "compact" => registry.with(fmt::layer().compact()).try_init(),
                _ => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format = get_log_format(), "Tabula logging initialized");
            }
        }
    });
}

/// Debug log that only fires when `TABULA_DEBUG` is set.
#[macro_export]
macro_rules! tabula_debug {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::debug!($($arg)*);
        }
    };
}

/// Trace log that only fires when `TABULA_DEBUG` is set.
#[macro_export]
macro_rules! tabula_trace {
    ($($arg:tt)*) => {
        if $crate::logging::is_debug_enabled() {
            tracing::trace!($($arg)*);
        }
    };
}
