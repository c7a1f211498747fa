//! Subscriber configuration.

use std::env;
use std::io::IsTerminal;
use std::str::FromStr;

/// Output format of the fmt layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// One JSON object per event.
    Json,
    /// Multi-line, coloured.
    Pretty,
    /// One line per event.
    #[default]
    Compact,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// How [`init_tracing`](super::init_tracing) builds the subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive, e.g. `info,plexec_executor=debug`.
    pub filter: String,
    /// Include file and line.
    pub include_location: bool,
    /// Include thread names. The worker is named `plexec-worker`.
    pub include_thread_names: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::default(),
            filter: "info".to_string(),
            include_location: false,
            include_thread_names: true,
        }
    }
}

fn env_flag(key: &str) -> Option<bool> {
    env::var(key).ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

impl TracingConfig {
    /// Read `PLEXEC_LOG_FORMAT`, `PLEXEC_LOG_LEVEL` (or `RUST_LOG`),
    /// `PLEXEC_LOG_LOCATION` and `PLEXEC_LOG_THREAD_NAMES`.
    ///
    /// Without an explicit format, a terminal gets `pretty` and anything
    /// else gets `json`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let format = env::var("PLEXEC_LOG_FORMAT")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(|| {
                if std::io::stderr().is_terminal() {
                    LogFormat::Pretty
                } else {
                    LogFormat::Json
                }
            });
        Self {
            format,
            filter: env::var("PLEXEC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.filter),
            include_location: env_flag("PLEXEC_LOG_LOCATION").unwrap_or(defaults.include_location),
            include_thread_names: env_flag("PLEXEC_LOG_THREAD_NAMES")
                .unwrap_or(defaults.include_thread_names),
        }
    }

    /// Set the format.
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Set the filter directive.
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    /// Include file and line in each event.
    pub fn with_location(mut self, include: bool) -> Self {
        self.include_location = include;
        self
    }
}
