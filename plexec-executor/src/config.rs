//! Scheduler and application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}

/// Scheduler settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecConfig {
    /// Passes allowed in one step before the scheduler gives up.
    pub max_passes_per_step: usize,
    /// Name of the monotonic time lookup.
    pub time_state: String,
    /// Size of the structured log buffer.
    pub log_buffer_capacity: usize,
}

impl Default for ExecConfig {
    fn default() -> Self {
        Self {
            max_passes_per_step: 10_000,
            time_state: "time".to_string(),
            log_buffer_capacity: plexec_core::logging::DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl ExecConfig {
    /// Read `PLEXEC_MAX_PASSES`, `PLEXEC_TIME_STATE` and
    /// `PLEXEC_LOG_BUFFER`, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_passes_per_step: env_parse("PLEXEC_MAX_PASSES")
                .unwrap_or(defaults.max_passes_per_step),
            time_state: std::env::var("PLEXEC_TIME_STATE").unwrap_or(defaults.time_state),
            log_buffer_capacity: env_parse("PLEXEC_LOG_BUFFER")
                .unwrap_or(defaults.log_buffer_capacity),
        }
    }

    /// Set the pass bound. At least 1.
    pub fn with_max_passes_per_step(mut self, passes: usize) -> Self {
        self.max_passes_per_step = passes.max(1);
        self
    }

    /// Set the time lookup name.
    pub fn with_time_state(mut self, name: impl Into<String>) -> Self {
        self.time_state = name.into();
        self
    }

    /// Set the log buffer size.
    pub fn with_log_buffer_capacity(mut self, capacity: usize) -> Self {
        self.log_buffer_capacity = capacity;
        self
    }
}

/// Application shell settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Scheduler settings.
    pub exec: ExecConfig,
    /// How long `stop` waits for the worker before escalating.
    pub stop_timeout_ms: u64,
    /// How often blocking waits re-check their condition.
    pub plan_poll_interval_ms: u64,
    /// Queue records placed on the free list at start-up.
    pub queue_prealloc: usize,
    /// Resource hierarchy file loaded by `initialize`.
    pub resource_file: Option<PathBuf>,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            exec: ExecConfig::default(),
            stop_timeout_ms: 1_000,
            plan_poll_interval_ms: 50,
            queue_prealloc: 64,
            resource_file: None,
        }
    }
}

impl ApplicationConfig {
    /// Read `PLEXEC_STOP_TIMEOUT_MS`, `PLEXEC_POLL_INTERVAL_MS`,
    /// `PLEXEC_QUEUE_PREALLOC`, `PLEXEC_RESOURCE_FILE` and the scheduler
    /// variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            exec: ExecConfig::from_env(),
            stop_timeout_ms: env_parse("PLEXEC_STOP_TIMEOUT_MS").unwrap_or(defaults.stop_timeout_ms),
            plan_poll_interval_ms: env_parse("PLEXEC_POLL_INTERVAL_MS")
                .unwrap_or(defaults.plan_poll_interval_ms),
            queue_prealloc: env_parse("PLEXEC_QUEUE_PREALLOC").unwrap_or(defaults.queue_prealloc),
            resource_file: std::env::var_os("PLEXEC_RESOURCE_FILE").map(PathBuf::from),
        }
    }

    /// Set the scheduler settings.
    pub fn with_exec(mut self, exec: ExecConfig) -> Self {
        self.exec = exec;
        self
    }

    /// Set the stop timeout.
    pub fn with_stop_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.stop_timeout_ms = timeout_ms;
        self
    }

    /// Set the wait poll interval. At least 1 ms.
    pub fn with_plan_poll_interval_ms(mut self, interval_ms: u64) -> Self {
        self.plan_poll_interval_ms = interval_ms.max(1);
        self
    }

    /// Set the queue preallocation.
    pub fn with_queue_prealloc(mut self, prealloc: usize) -> Self {
        self.queue_prealloc = prealloc;
        self
    }

    /// Load a resource hierarchy file at initialization.
    pub fn with_resource_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.resource_file = Some(path.into());
        self
    }

    /// Stop timeout as a duration.
    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    /// Poll interval as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.plan_poll_interval_ms.max(1))
    }
}
