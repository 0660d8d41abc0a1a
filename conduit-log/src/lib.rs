//! Conduit Logging
//!
//! Installs a `tracing` subscriber configured from the environment. Every Conduit
//! crate logs through the `tracing` macros; this crate only decides where those
//! records go and how they look.
//!
//! # Usage
//!
//! ```rust,no_run
//! fn main() {
//!     conduit_log::init().expect("logging already initialised elsewhere");
//!     tracing::info!(port = 8080, "service started");
//! }
//! ```
//!
//! # Environment Variables
//!
//! - `CONDUIT_DEBUG=1` - Enable debug logging
//! - `CONDUIT_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `CONDUIT_LOG_FORMAT=pretty|json|compact` - Set output format
//! - `CONDUIT_LOG_COLOR=1|0` - Enable/disable ANSI colors
//! - `RUST_LOG` - Per-target directives, takes precedence over the level

use std::env;

use tracing_subscriber::EnvFilter;

// ============================================================================
// Log Levels
// ============================================================================

/// Log level for Conduit logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum Level {
    /// Trace level (most verbose)
    Trace = 0,
    /// Debug level
    Debug = 1,
    /// Info level
    Info = 2,
    /// Warning level
    Warn = 3,
    /// Error level (least verbose)
    Error = 4,
    /// Off (no logging)
    Off = 5,
}

impl Level {
    /// Parse a level name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Directive understood by `EnvFilter`.
    pub fn as_directive(&self) -> &'static str {
        match self {
            Level::Trace => "trace",
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
            Level::Off => "off",
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_directive().to_uppercase())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Compact single-line format
    Compact,
    /// JSON format for structured logging
    Json,
}

impl Format {
    /// Parse a format name, case-insensitively.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "pretty" => Some(Format::Pretty),
            "compact" => Some(Format::Compact),
            "json" => Some(Format::Json),
            _ => None,
        }
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether colors are enabled
    pub color: bool,
    /// Whether to include the module path of each record
    pub module_path: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            module_path: true,
        }
    }
}

impl LogConfig {
    /// Create config from process environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Create config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| {
            lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        };

        let debug = flag("CONDUIT_DEBUG").unwrap_or(false);

        let level = lookup("CONDUIT_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("CONDUIT_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        let color = flag("CONDUIT_LOG_COLOR")
            .unwrap_or_else(|| lookup("NO_COLOR").is_none() && lookup("TERM").is_some());

        let module_path = flag("CONDUIT_LOG_MODULE").unwrap_or(true);

        Self {
            debug,
            level,
            format,
            color: color && format != Format::Json,
            module_path,
        }
    }

    /// Build the filter: `RUST_LOG` wins, otherwise the configured level.
    pub fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.as_directive()))
    }
}

/// Errors raised while installing the subscriber.
#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("Global subscriber already installed: {0}")]
    AlreadyInitialized(String),
}

// ============================================================================
// Public API
// ============================================================================

/// Install the global subscriber using [`LogConfig::from_env`].
pub fn init() -> Result<(), LogError> {
    init_with(&LogConfig::from_env())
}

/// Install the global subscriber with an explicit configuration.
///
/// Fails if another subscriber is already installed, which callers that may be
/// initialised twice (tests, embedded services) can ignore.
pub fn init_with(config: &LogConfig) -> Result<(), LogError> {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_ansi(config.color)
        .with_target(config.module_path);

    let result = match config.format {
        Format::Pretty => builder.pretty().try_init(),
        Format::Compact => builder.compact().try_init(),
        #[cfg(feature = "json")]
        Format::Json => builder.json().try_init(),
        #[cfg(not(feature = "json"))]
        Format::Json => builder.try_init(),
    };

    result.map_err(|e| LogError::AlreadyInitialized(e.to_string()))?;

    tracing::debug!(
        level = %config.level,
        format = ?config.format,
        "Logging initialised"
    );
    Ok(())
}

// ============================================================================
// Tests
// ============================================================================
