//! Structured log events.
//!
//! Events carry the run and node they concern so a single execution can be
//! reconstructed from a shared buffer.

use crate::types::{NodeId, NodeState, RunId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Log severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Per-condition detail.
    Trace,
    /// Per-transition detail.
    Debug,
    /// Normal operation.
    #[default]
    Info,
    /// Something unexpected that execution survived.
    Warn,
    /// The executive halted or refused work.
    Error,
}

impl LogLevel {
    /// Parse a level name. Accepts `warning` for `warn`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "trace" => Some(Self::Trace),
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trace => "trace",
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or("invalid log level")
    }
}

/// What part of the executive produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogCategory {
    /// Node state transitions.
    Transition,
    /// Command dispatch, acks and aborts.
    Command,
    /// Resource arbitration.
    Resource,
    /// Input queue processing.
    Queue,
    /// Plan and library insertion.
    Plan,
    /// Application lifecycle.
    Application,
    /// Anything else.
    System,
}

impl LogCategory {
    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transition => "transition",
            Self::Command => "command",
            Self::Resource => "resource",
            Self::Queue => "queue",
            Self::Plan => "plan",
            Self::Application => "application",
            Self::System => "system",
        }
    }
}

impl fmt::Display for LogCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEvent {
    /// Sequence number assigned by the collector; 0 until collected.
    pub id: u64,
    /// Wall-clock time in nanoseconds since the Unix epoch.
    pub timestamp_ns: u64,
    /// Severity.
    pub level: LogLevel,
    /// Source area.
    pub category: LogCategory,
    /// Executive run.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Node concerned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Name of the node concerned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Human-readable text.
    pub message: String,
    /// Extra structured data.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub fields: HashMap<String, serde_json::Value>,
}

impl LogEvent {
    /// Create an event stamped with the current time.
    pub fn new(level: LogLevel, category: LogCategory, message: impl Into<String>) -> Self {
        Self {
            id: 0,
            timestamp_ns: now_ns(),
            level,
            category,
            run_id: None,
            node_id: None,
            node_name: None,
            message: message.into(),
            fields: HashMap::new(),
        }
    }

    /// A debug event.
    pub fn debug(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, category, message)
    }

    /// An info event.
    pub fn info(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, category, message)
    }

    /// A warning.
    pub fn warn(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warn, category, message)
    }

    /// An error.
    pub fn error(category: LogCategory, message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, category, message)
    }

    /// A transition record for a node.
    pub fn transition(
        node_id: NodeId,
        node_name: impl Into<String>,
        from: NodeState,
        to: NodeState,
    ) -> Self {
        Self::debug(LogCategory::Transition, format!("{from} -> {to}"))
            .with_node(node_id, node_name)
            .with_field("from", from.as_str())
            .with_field("to", to.as_str())
    }

    /// Attach the run.
    pub fn with_run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Attach the node.
    pub fn with_node(mut self, node_id: NodeId, node_name: impl Into<String>) -> Self {
        self.node_id = Some(node_id);
        self.node_name = Some(node_name.into());
        self
    }

    /// Attach a string field.
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields
            .insert(key.into(), serde_json::Value::String(value.into()));
        self
    }

    /// Attach a numeric field.
    pub fn with_field_u64(mut self, key: impl Into<String>, value: u64) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Attach any JSON value.
    pub fn with_field_json(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Timestamp as RFC 3339 with millisecond precision.
    pub fn timestamp_iso(&self) -> String {
        let secs = (self.timestamp_ns / 1_000_000_000) as i64;
        let nanos = (self.timestamp_ns % 1_000_000_000) as u32;
        match chrono::DateTime::from_timestamp(secs, nanos) {
            Some(at) => at.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
            None => format!("{}ns", self.timestamp_ns),
        }
    }

    /// One-line rendering for text sinks.
    pub fn format_line(&self) -> String {
        let mut line = format!(
            "{} [{}] [{}]",
            self.timestamp_iso(),
            self.level.as_str().to_ascii_uppercase(),
            self.category
        );
        if let Some(run_id) = self.run_id {
            line.push_str(&format!(" run={run_id}"));
        }
        match (&self.node_name, self.node_id) {
            (Some(name), Some(id)) => line.push_str(&format!(" node={name}({})", id.as_u32())),
            (None, Some(id)) => line.push_str(&format!(" node={}", id.as_u32())),
            _ => {}
        }
        line.push(' ');
        line.push_str(&self.message);
        if !self.fields.is_empty() {
            let mut fields: Vec<String> =
                self.fields.iter().map(|(k, v)| format!("{k}={v}")).collect();
            fields.sort();
            line.push_str(&format!(" {{{}}}", fields.join(", ")));
        }
        line
    }
}

fn now_ns() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos() as u64)
        .unwrap_or(0)
}
