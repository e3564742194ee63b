//! Logging setup shared by the library and the `thread-post` binary
//!
//! Everything is written to stderr; stdout is reserved for command output
//! such as post URIs and exported drafts.
//!
//! ```no_run
//! use libthreadpost::logging::{LogFormat, LoggingConfig};
//!
//! // Environment first, then explicit overrides from flags
//! let mut config = LoggingConfig::from_env();
//! config.format = LogFormat::Json;
//! config.init();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

pub const LOG_FORMAT_ENV: &str = "THREADPOST_LOG_FORMAT";
pub const LOG_LEVEL_ENV: &str = "THREADPOST_LOG_LEVEL";

const DEFAULT_LEVEL: &str = "warn";

/// HTTP internals stay at warn unless `RUST_LOG` says otherwise
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Plain lines without colors
    #[default]
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line, colored, with source locations
    Pretty,
}

impl LogFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogFormat::Text => "text",
            LogFormat::Json => "json",
            LogFormat::Pretty => "pretty",
        }
    }
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [LogFormat::Text, LogFormat::Json, LogFormat::Pretty]
            .into_iter()
            .find(|format| format.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                format!(
                    "Invalid log format: '{}'. Valid options: text, json, pretty",
                    s
                )
            })
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Level directive for threadpost's own targets
    pub level: String,
    /// Forces debug, overriding `level`
    pub verbose: bool,
}

impl LoggingConfig {
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    /// Read `THREADPOST_LOG_FORMAT` and `THREADPOST_LOG_LEVEL`
    ///
    /// Unset or unparseable values fall back to text at warn.
    pub fn from_env() -> Self {
        let format = std::env::var(LOG_FORMAT_ENV)
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default();
        let level = std::env::var(LOG_LEVEL_ENV)
            .ok()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());
        Self::new(format, level, false)
    }

    fn filter_directive(&self) -> String {
        let level = if self.verbose { "debug" } else { self.level.as_str() };
        let mut directive = level.to_string();
        for target in QUIET_DEPENDENCIES {
            directive.push_str(&format!(",{}=warn", target));
        }
        directive
    }

    /// Install the global subscriber
    ///
    /// `RUST_LOG` wins over the configured level when set. A second call is
    /// a no-op.
    pub fn init(&self) {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(self.filter_directive()));
        let builder = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr);

        let installed = match self.format {
            LogFormat::Json => builder
                .json()
                .flatten_event(true)
                .with_current_span(true)
                .with_span_list(true)
                .try_init(),
            LogFormat::Pretty => builder
                .pretty()
                .with_file(true)
                .with_line_number(true)
                .try_init(),
            LogFormat::Text => builder.with_ansi(false).with_target(false).try_init(),
        };

        if installed.is_err() {
            tracing::debug!("Logging already initialized");
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self::new(LogFormat::Text, DEFAULT_LEVEL.to_string(), false)
    }
}

/// `LoggingConfig::from_env().init()`
pub fn init_default() {
    LoggingConfig::from_env().init();
}
