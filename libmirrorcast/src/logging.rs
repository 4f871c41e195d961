//! Logging for Mirrorcast binaries and runs
//!
//! Two layers:
//! - [`LoggingConfig`] installs the process-wide `tracing` subscriber
//!   (text, JSON or pretty output on stderr, filtered by level).
//! - [`RunLog`] is the report channel handed to the pipeline and runner. It
//!   takes finished lines, or closures that build a line only when someone
//!   is listening. [`TracingLog`] forwards to `tracing`; [`MemoryLog`] keeps
//!   lines for assertions.
//!
//! # Examples
//!
//! ```no_run
//! use libmirrorcast::logging::{LoggingConfig, LogFormat};
//!
//! // Initialize with JSON format
//! let config = LoggingConfig::new(LogFormat::Json, "info".to_string(), false);
//! config.init();
//!
//! // Or use default settings (respects env vars)
//! libmirrorcast::logging::init_default();
//! ```

use std::str::FromStr;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable text output (no colors, for piping)
    Text,
    /// Machine-parseable JSON (one JSON object per line)
    Json,
    /// Pretty-printed with colors (for development)
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

/// Configuration for logging initialization
pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// Create a new logging configuration
    ///
    /// * `format` - Log output format (text, json, or pretty)
    /// * `level` - Minimum log level (error, warn, info, debug, trace)
    /// * `verbose` - If true, defaults to debug level
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Initialize logging with the configured settings
    ///
    /// Call once at program start. `RUST_LOG` overrides the configured level.
    ///
    /// # Panics
    ///
    /// Panics if the logging subscriber has already been initialized
    pub fn init(&self) {
        use tracing_subscriber::EnvFilter;

        let level = if self.verbose { "debug" } else { self.level.as_str() };
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

        match self.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_target(true)
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .init();
            }
        }
    }
}

/// Initialize logging with default settings
///
/// Respects `MIRRORCAST_LOG_FORMAT` and `MIRRORCAST_LOG_LEVEL`. Falls back to
/// text format with info level if not set.
pub fn init_default() {
    let format = std::env::var("MIRRORCAST_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level = std::env::var("MIRRORCAST_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, false).init();
}

/// Sink for run progress and result lines
pub trait RunLog: Send + Sync {
    /// Record a finished line
    fn line(&self, line: &str);

    /// Whether lines are currently recorded at all
    fn enabled(&self) -> bool {
        true
    }

    /// Record a line built on demand; `build` is not called when disabled
    fn lazy(&self, build: &dyn Fn() -> String) {
        if self.enabled() {
            self.line(&build());
        }
    }
}

/// Forwards run lines to `tracing` at info level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLog;

impl RunLog for TracingLog {
    fn line(&self, line: &str) {
        tracing::info!(target: "mirrorcast::run", "{}", line);
    }

    fn enabled(&self) -> bool {
        tracing::enabled!(target: "mirrorcast::run", tracing::Level::INFO)
    }
}

/// Keeps run lines in memory; clones share the same buffer
#[derive(Debug, Clone, Default)]
pub struct MemoryLog {
    lines: Arc<Mutex<Vec<String>>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines.lock().unwrap().iter().any(|l| l.contains(needle))
    }
}

impl RunLog for MemoryLog {
    fn line(&self, line: &str) {
        self.lines.lock().unwrap().push(line.to_string());
    }
}
