//! Admission control for commands that share resources.

use super::hierarchy::ResourceHierarchy;
use super::request::{ResourceRequest, ResourceUsage};
use crate::error::{PlexecError, Result};
use crate::types::NodeId;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Amounts below this are treated as zero when releasing.
const EPSILON: f64 = 1e-9;

/// A command waiting to start.
#[derive(Debug, Clone)]
pub struct PendingCommand {
    /// The command node.
    pub node: NodeId,
    /// Arbitration priority.
    pub priority: i32,
    /// Declared resource requests.
    pub resources: Vec<ResourceRequest>,
}

/// Result of one arbitration round.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arbitration {
    /// Admitted commands, in admission order.
    pub accepted: Vec<NodeId>,
    /// Rejected commands, in arrival order.
    pub denied: Vec<NodeId>,
}

/// Decides which pending commands may run without exceeding capacities.
///
/// Holds the locked-resource ledger. Only the scheduler thread calls
/// [`arbitrate`](Self::arbitrate) and [`release`](Self::release).
#[derive(Debug, Default)]
pub struct ResourceArbiter {
    hierarchy: ResourceHierarchy,
    locked: HashMap<String, f64>,
    held: HashMap<NodeId, Vec<ResourceUsage>>,
}

impl ResourceArbiter {
    /// Create an arbiter over a hierarchy.
    pub fn new(hierarchy: ResourceHierarchy) -> Self {
        Self {
            hierarchy,
            locked: HashMap::new(),
            held: HashMap::new(),
        }
    }

    /// The resource hierarchy.
    pub fn hierarchy(&self) -> &ResourceHierarchy {
        &self.hierarchy
    }

    /// Replace the hierarchy. The ledger is kept.
    pub fn set_hierarchy(&mut self, hierarchy: ResourceHierarchy) {
        self.hierarchy = hierarchy;
    }

    /// Amount of a resource currently locked.
    pub fn locked(&self, name: &str) -> f64 {
        self.locked.get(name).copied().unwrap_or(0.0)
    }

    /// Snapshot of the ledger, sorted by resource name.
    pub fn locked_resources(&self) -> BTreeMap<String, f64> {
        self.locked
            .iter()
            .map(|(name, amount)| (name.clone(), *amount))
            .collect()
    }

    /// Check if a command holds resources.
    pub fn holds(&self, node: NodeId) -> bool {
        self.held.contains_key(&node)
    }

    /// Admit the highest-priority subset of a batch.
    ///
    /// Candidates are ordered by priority, larger first, ties in arrival
    /// order. Each is admitted if every resource it touches stays within
    /// capacity given what is already locked, including amounts locked by
    /// earlier admissions in the same batch. Commands without resources
    /// are always admitted.
    pub fn arbitrate(&mut self, pending: &[PendingCommand]) -> Result<Arbitration> {
        let mut order: Vec<&PendingCommand> = pending.iter().collect();
        order.sort_by(|a, b| b.priority.cmp(&a.priority));

        let mut accepted = Vec::new();
        for command in order {
            if let Some(bad) = command
                .resources
                .iter()
                .find(|r| !r.upper_bound.is_finite() || r.upper_bound < 0.0)
            {
                return Err(PlexecError::ResourceRequest {
                    node: command.node,
                    resource: bad.name.clone(),
                    cause: format!("amount {} is not a non-negative number", bad.upper_bound),
                });
            }

            let usages = self.hierarchy.expand(&command.resources);
            let fits = usages.iter().all(|usage| {
                self.locked(&usage.name) + usage.amount
                    <= self.hierarchy.capacity(&usage.name, usage.release) + EPSILON
            });
            if !fits {
                debug!(node = %command.node, priority = command.priority, "Command denied resources");
                continue;
            }

            for usage in &usages {
                *self.locked.entry(usage.name.clone()).or_insert(0.0) += usage.amount;
            }
            if !usages.is_empty() {
                self.held.insert(command.node, usages);
            }
            accepted.push(command.node);
        }

        let denied: Vec<NodeId> = pending
            .iter()
            .map(|c| c.node)
            .filter(|node| !accepted.contains(node))
            .collect();
        if !denied.is_empty() {
            info!(
                accepted = accepted.len(),
                denied = denied.len(),
                "Resource arbitration denied commands"
            );
        }
        Ok(Arbitration { accepted, denied })
    }

    /// Return a command's releasable amounts.
    ///
    /// Consumable amounts stay locked. Returns false if the command held
    /// nothing.
    pub fn release(&mut self, node: NodeId) -> bool {
        let Some(usages) = self.held.remove(&node) else {
            return false;
        };
        for usage in usages.iter().filter(|u| u.release) {
            if let Some(amount) = self.locked.get_mut(&usage.name) {
                *amount -= usage.amount;
                if amount.abs() < EPSILON {
                    self.locked.remove(&usage.name);
                }
            }
        }
        debug!(node = %node, "Released resources");
        true
    }
}
