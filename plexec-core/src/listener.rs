//! Read-only notifications about executive progress.

use crate::node::{Node, NodeType};
use crate::types::{FailureType, NodeId, NodeState, Outcome};
use serde::{Deserialize, Serialize};

/// Snapshot of one node transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeTransition {
    /// The node.
    pub node: NodeId,
    /// Its name.
    pub name: String,
    /// Its type.
    pub node_type: NodeType,
    /// State before the transition.
    pub from: NodeState,
    /// State after the transition.
    pub to: NodeState,
    /// Outcome after the transition.
    pub outcome: Option<Outcome>,
    /// Failure type after the transition.
    pub failure_type: Option<FailureType>,
    /// Step in which it happened.
    pub step: u64,
}

impl NodeTransition {
    /// Capture a node right after it left `from`.
    pub fn capture(node: &Node, from: NodeState, step: u64) -> Self {
        Self {
            node: node.id(),
            name: node.name().to_string(),
            node_type: node.node_type(),
            from,
            to: node.state(),
            outcome: node.outcome(),
            failure_type: node.failure_type(),
            step,
        }
    }
}

/// Observer of the scheduler.
///
/// Callbacks run on the worker thread with the exec lock held. They must
/// be quick and must not call back into the executive.
pub trait ExecListener: Send + Sync {
    /// Transitions performed in one pass, in the order they happened.
    fn on_transitions(&self, transitions: &[NodeTransition]) {
        let _ = transitions;
    }

    /// A plan was inserted.
    fn on_plan_added(&self, root: &str, parent: Option<&str>) {
        let _ = (root, parent);
    }

    /// A library was registered.
    fn on_library_added(&self, name: &str) {
        let _ = name;
    }

    /// A step reached quiescence.
    fn on_step_complete(&self, step: u64) {
        let _ = step;
    }
}
