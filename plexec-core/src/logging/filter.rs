//! Queries over collected events.

use super::event::{LogCategory, LogEvent, LogLevel};
use crate::types::{NodeId, RunId};
use serde::{Deserialize, Serialize};

/// Conjunction of optional criteria. An empty filter matches everything.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogFilter {
    /// Lowest level to keep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_level: Option<LogLevel>,
    /// Categories to keep; empty keeps all.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<LogCategory>,
    /// Run to keep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<RunId>,
    /// Node to keep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_id: Option<NodeId>,
    /// Node name to keep.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_name: Option<String>,
    /// Case-insensitive substring of the message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_contains: Option<String>,
    /// Keep only events with a larger sequence number.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after_id: Option<u64>,
    /// Maximum number of events returned by a query.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl LogFilter {
    /// Match everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep `level` and above.
    pub fn min_level(mut self, level: LogLevel) -> Self {
        self.min_level = Some(level);
        self
    }

    /// Add a category.
    pub fn category(mut self, category: LogCategory) -> Self {
        self.categories.push(category);
        self
    }

    /// Restrict to one run.
    pub fn run_id(mut self, run_id: RunId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Restrict to one node.
    pub fn node_id(mut self, node_id: NodeId) -> Self {
        self.node_id = Some(node_id);
        self
    }

    /// Restrict to one node, by name.
    pub fn node_name(mut self, name: impl Into<String>) -> Self {
        self.node_name = Some(name.into());
        self
    }

    /// Require a message substring.
    pub fn message_contains(mut self, pattern: impl Into<String>) -> Self {
        self.message_contains = Some(pattern.into());
        self
    }

    /// Keep events collected after `id`.
    pub fn after(mut self, id: u64) -> Self {
        self.after_id = Some(id);
        self
    }

    /// Cap the result size.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Check one event. `limit` is not considered.
    pub fn matches(&self, event: &LogEvent) -> bool {
        if self.min_level.is_some_and(|min| event.level < min) {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&event.category) {
            return false;
        }
        if self.run_id.is_some() && event.run_id != self.run_id {
            return false;
        }
        if self.node_id.is_some() && event.node_id != self.node_id {
            return false;
        }
        if let Some(name) = &self.node_name {
            if event.node_name.as_deref() != Some(name.as_str()) {
                return false;
            }
        }
        if let Some(pattern) = &self.message_contains {
            if !event
                .message
                .to_lowercase()
                .contains(&pattern.to_lowercase())
            {
                return false;
            }
        }
        if self.after_id.is_some_and(|after| event.id <= after) {
            return false;
        }
        true
    }

    /// Check if no criterion is set.
    pub fn is_empty(&self) -> bool {
        self.min_level.is_none()
            && self.categories.is_empty()
            && self.run_id.is_none()
            && self.node_id.is_none()
            && self.node_name.is_none()
            && self.message_contains.is_none()
            && self.after_id.is_none()
    }
}
