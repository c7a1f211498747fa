//! Resource requests declared by command nodes.

use serde::{Deserialize, Serialize};

fn default_upper_bound() -> f64 {
    1.0
}

fn default_release() -> bool {
    true
}

/// One named resource a command needs while it runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequest {
    /// Resource name, as defined in the hierarchy.
    pub name: String,
    /// Arbitration priority. Larger values are admitted first.
    #[serde(default)]
    pub priority: i32,
    /// Amount of the resource consumed.
    #[serde(default = "default_upper_bound")]
    pub upper_bound: f64,
    /// Whether the amount is returned when the command terminates.
    #[serde(default = "default_release")]
    pub release_at_termination: bool,
}

impl ResourceRequest {
    /// Request one unit of a resource, released at termination.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            priority: 0,
            upper_bound: default_upper_bound(),
            release_at_termination: default_release(),
        }
    }

    /// Set the priority.
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Set the amount.
    pub fn with_amount(mut self, amount: f64) -> Self {
        self.upper_bound = amount;
        self
    }

    /// Mark the amount as consumed for good.
    pub fn consumable(mut self) -> Self {
        self.release_at_termination = false;
        self
    }
}

/// A resource amount held by an admitted command, after expansion
/// against the hierarchy.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceUsage {
    /// Resource name.
    pub name: String,
    /// Amount locked.
    pub amount: f64,
    /// Whether the amount is returned on release.
    pub release: bool,
}
