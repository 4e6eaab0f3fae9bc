//! Trellis Logging
//!
//! Structured logging for the trellis crates, driven by environment
//! variables and backed by `tracing`.
//!
//! # Usage
//!
//! ```rust
//! use trellis_log::{debug, info, warn};
//!
//! trellis_log::init();
//!
//! info!(shell = "Default", "opening data context");
//! debug!(target: "trellis::model_cache", schema = "t1", "cache miss");
//! warn!("lifecycle sink rejected a transition");
//! ```
//!
//! # Environment Variables
//!
//! - `TRELLIS_DEBUG=1` - Enable debug logging
//! - `TRELLIS_LOG_LEVEL=trace|debug|info|warn|error|off` - Set log level
//! - `TRELLIS_LOG_FORMAT=pretty|compact|json` - Set output format
//! - `TRELLIS_LOG_COLOR=1|0` - Enable/disable colors
//! - `TRELLIS_LOG_TIMESTAMPS=1|0` - Include timestamps
//! - `RUST_LOG` - Full `EnvFilter` directives, overrides the level

use once_cell::sync::{Lazy, OnceCell};
use std::env;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

pub use tracing::{debug, error, info, trace, warn};

// ============================================================================
// Log Levels
// ============================================================================

/// Minimum level emitted by the subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
    Off,
}

impl Level {
    /// Parse a level name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "trace" => Some(Level::Trace),
            "debug" => Some(Level::Debug),
            "info" => Some(Level::Info),
            "warn" | "warning" => Some(Level::Warn),
            "error" => Some(Level::Error),
            "off" | "none" => Some(Level::Off),
            _ => None,
        }
    }

    /// Directive string understood by `EnvFilter`.
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

    fn as_filter(&self) -> LevelFilter {
        match self {
            Level::Trace => LevelFilter::TRACE,
            Level::Debug => LevelFilter::DEBUG,
            Level::Info => LevelFilter::INFO,
            Level::Warn => LevelFilter::WARN,
            Level::Error => LevelFilter::ERROR,
            Level::Off => LevelFilter::OFF,
        }
    }
}

impl std::fmt::Display for Level {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_directive())
    }
}

// ============================================================================
// Log Format
// ============================================================================

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// Multi-line human readable output
    Pretty,
    /// Single-line output
    Compact,
    /// One JSON object per line
    Json,
}

impl Format {
    /// Parse a format name, case-insensitive.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
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

static CONFIG: Lazy<LogConfig> = Lazy::new(LogConfig::from_env);

static INSTALLED: OnceCell<bool> = OnceCell::new();

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether debug mode is enabled
    pub debug: bool,
    /// Minimum log level
    pub level: Level,
    /// Output format
    pub format: Format,
    /// Whether ANSI colors are enabled
    pub color: bool,
    /// Whether to include timestamps
    pub timestamps: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            debug: false,
            level: Level::Info,
            format: Format::Json,
            color: false,
            timestamps: true,
        }
    }
}

impl LogConfig {
    /// Read the configuration from `TRELLIS_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let flag = |key: &str| lookup(key).map(|v| v == "1" || v.eq_ignore_ascii_case("true"));

        let debug = flag("TRELLIS_DEBUG").unwrap_or(false);

        let level = lookup("TRELLIS_LOG_LEVEL")
            .and_then(|s| Level::parse(&s))
            .unwrap_or(if debug { Level::Debug } else { Level::Info });

        let format = lookup("TRELLIS_LOG_FORMAT")
            .and_then(|s| Format::parse(&s))
            .unwrap_or(Format::Json);

        // JSON lines never carry escape codes
        let color = flag("TRELLIS_LOG_COLOR")
            .unwrap_or(format != Format::Json && lookup("NO_COLOR").is_none());

        let timestamps = flag("TRELLIS_LOG_TIMESTAMPS").unwrap_or(true);

        Self {
            debug,
            level,
            format,
            color,
            timestamps,
        }
    }

    /// Set the minimum level.
    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set the output format.
    pub fn with_format(mut self, format: Format) -> Self {
        self.format = format;
        self
    }

    /// Filter used when `RUST_LOG` is not set.
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::builder()
            .with_default_directive(self.level.as_filter().into())
            .from_env_lossy()
    }

    fn fmt_layer(&self) -> Box<dyn Layer<Registry> + Send + Sync> {
        let base = fmt::layer().with_ansi(self.color).with_target(true);

        match (self.format, self.timestamps) {
            #[cfg(feature = "json")]
            (Format::Json, true) => base.json().boxed(),
            #[cfg(feature = "json")]
            (Format::Json, false) => base.json().without_time().boxed(),
            (Format::Pretty, true) => base.pretty().boxed(),
            (Format::Pretty, false) => base.pretty().without_time().boxed(),
            (_, true) => base.compact().boxed(),
            (_, false) => base.compact().without_time().boxed(),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Global configuration, read once from the environment.
pub fn config() -> &'static LogConfig {
    &CONFIG
}

/// Build a subscriber for the given configuration.
pub fn subscriber_with(config: &LogConfig) -> impl tracing::Subscriber + Send + Sync {
    use tracing_subscriber::prelude::*;

    tracing_subscriber::registry()
        .with(config.fmt_layer())
        .with(config.env_filter())
}

/// Build a subscriber from the environment configuration.
pub fn subscriber() -> impl tracing::Subscriber + Send + Sync {
    subscriber_with(config())
}

/// Install the global subscriber.
///
/// Safe to call repeatedly; only the first call installs anything. Returns
/// `false` when another subscriber was already installed by the host.
pub fn init() -> bool {
    *INSTALLED.get_or_init(|| tracing::subscriber::set_global_default(subscriber()).is_ok())
}

// ============================================================================
// Tests
// ============================================================================
