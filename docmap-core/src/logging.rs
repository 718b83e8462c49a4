//! Logging setup.
//!
//! The crate logs through `tracing`; this module installs a subscriber for
//! applications that do not bring their own. It is driven by environment
//! variables:
//!
//! - `DOCMAP_DEBUG=true|1|yes` enables debug logging
//! - `DOCMAP_LOG_LEVEL=trace|debug|info|warn|error` sets the level
//! - `DOCMAP_LOG_FORMAT=json|pretty|compact` sets the format (default: json)
//!
//! ```rust,no_run
//! docmap_core::logging::init();
//! ```
//!
//! Installing the subscriber needs the `tracing-subscriber` feature. Without
//! it, `init` only resolves settings and events reach whatever subscriber the
//! host application installed.

use std::sync::Once;

use crate::env::{EnvSource, StdEnvSource};

static INIT: Once = Once::new();

/// Variable enabling debug logging.
pub const DEBUG_VAR: &str = "DOCMAP_DEBUG";
/// Variable selecting the log level.
pub const LEVEL_VAR: &str = "DOCMAP_LOG_LEVEL";
/// Variable selecting the output format.
pub const FORMAT_VAR: &str = "DOCMAP_LOG_FORMAT";

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human readable output.
    Pretty,
    /// Single-line human readable output.
    Compact,
}

/// Logging settings resolved from the environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    /// Whether logging was requested at all.
    pub enabled: bool,
    /// Level directive.
    pub level: &'static str,
    /// Output format.
    pub format: LogFormat,
}

impl LogSettings {
    /// Resolve settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_source(&StdEnvSource)
    }

    /// Resolve settings from an environment source.
    pub fn from_source(source: &impl EnvSource) -> Self {
        let debug = debug_flag(source);
        let fallback = if debug { "debug" } else { "warn" };

        let level = match source.get(LEVEL_VAR).map(|l| l.to_lowercase()) {
            Some(level) => match level.as_str() {
                "trace" => "trace",
                "debug" => "debug",
                "info" => "info",
                "warn" => "warn",
                "error" => "error",
                _ => fallback,
            },
            None => fallback,
        };

        let format = match source.get(FORMAT_VAR).map(|f| f.to_lowercase()).as_deref() {
            Some("pretty") => LogFormat::Pretty,
            Some("compact") => LogFormat::Compact,
            _ => LogFormat::Json,
        };

        Self {
            enabled: debug || source.contains(LEVEL_VAR),
            level,
            format,
        }
    }
}

/// Check if debug logging is enabled via `DOCMAP_DEBUG`.
pub fn is_debug_enabled() -> bool {
    debug_flag(&StdEnvSource)
}

fn debug_flag(source: &impl EnvSource) -> bool {
    source
        .get(DEBUG_VAR)
        .is_some_and(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Initialize logging from the process environment. Later calls are no-ops.
pub fn init() {
    init_with(LogSettings::from_env());
}

/// Initialize logging with explicit settings. Later calls are no-ops.
pub fn init_with(settings: LogSettings) {
    INIT.call_once(|| {
        if !settings.enabled {
            return;
        }

        #[cfg(feature = "tracing-subscriber")]
        {
            use tracing_subscriber::{EnvFilter, fmt, prelude::*};

            let level = settings.level;
            let filter = EnvFilter::try_new(format!(
                "docmap={},docmap_core={},docmap_mongodb={}",
                level, level, level
            ))
            .unwrap_or_else(|_| EnvFilter::new("warn"));

            let registry = tracing_subscriber::registry().with(filter);
            let installed = match settings.format {
                LogFormat::Json => registry.with(fmt::layer().json()).try_init(),
                LogFormat::Compact => registry.with(fmt::layer().compact()).try_init(),
                LogFormat::Pretty => registry.with(fmt::layer().pretty()).try_init(),
            };

            if installed.is_ok() {
                tracing::info!(level, format = ?settings.format, "docmap logging initialized");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::MapEnvSource;

    #[test]
    fn test_disabled_by_default() {
        let settings = LogSettings::from_source(&MapEnvSource::new());
        assert!(!settings.enabled);
        assert_eq!(settings.level, "warn");
        assert_eq!(settings.format, LogFormat::Json);
    }

    #[test]
    fn test_debug_flag() {
        let settings = LogSettings::from_source(&MapEnvSource::new().set(DEBUG_VAR, "YES"));
        assert!(settings.enabled);
        assert_eq!(settings.level, "debug");
    }

    #[test]
    fn test_explicit_level_and_format() {
        let source = MapEnvSource::new()
            .set(LEVEL_VAR, "Trace")
            .set(FORMAT_VAR, "compact");
        let settings = LogSettings::from_source(&source);
        assert!(settings.enabled);
        assert_eq!(settings.level, "trace");
        assert_eq!(settings.format, LogFormat::Compact);
    }

    #[test]
    fn test_unknown_level_falls_back() {
        let source = MapEnvSource::new().set(LEVEL_VAR, "loud");
        assert_eq!(LogSettings::from_source(&source).level, "warn");
    }
}
