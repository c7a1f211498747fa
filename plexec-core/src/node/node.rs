//! A single plan node.

use super::body::{NodeBody, NodeType};
use super::condition::{ConditionKind, ConditionSet};
use super::expr::Expr;
use crate::error::{PlexecError, Result};
use crate::types::{CommandHandle, FailureType, NodeId, NodeState, Outcome};

/// A node of the plan tree.
///
/// Children are owned by the tree arena and referenced by ID; the parent
/// link is a plain ID used only for derived-condition look-ups.
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) id: NodeId,
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) state: NodeState,
    pub(crate) active: ConditionSet,
    pub(crate) user: [Option<Expr>; ConditionKind::COUNT],
    pub(crate) outcome: Option<Outcome>,
    pub(crate) failure_type: Option<FailureType>,
    pub(crate) body: NodeBody,
    pub(crate) iteration: u32,
}

impl Node {
    pub(crate) fn new(id: NodeId, name: String, parent: Option<NodeId>, body: NodeBody) -> Self {
        Self {
            id,
            name,
            parent,
            children: Vec::new(),
            state: NodeState::Inactive,
            active: ConditionSet::EMPTY,
            user: Default::default(),
            outcome: None,
            failure_type: None,
            body,
            iteration: 0,
        }
    }

    /// Node ID.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// Node name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node type.
    pub fn node_type(&self) -> NodeType {
        self.body.node_type()
    }

    /// Parent, if not a root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in declaration order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Current life-cycle state.
    pub fn state(&self) -> NodeState {
        self.state
    }

    /// Conditions currently active.
    pub fn active_conditions(&self) -> ConditionSet {
        self.active
    }

    /// Check if a condition is active.
    pub fn is_active(&self, kind: ConditionKind) -> bool {
        self.active.contains(kind)
    }

    /// The plan-supplied expression for a condition, if any.
    pub fn user_condition(&self, kind: ConditionKind) -> Option<&Expr> {
        self.user[kind.index()].as_ref()
    }

    /// Outcome of the current iteration.
    pub fn outcome(&self) -> Option<Outcome> {
        self.outcome
    }

    /// Failure type of the current iteration.
    pub fn failure_type(&self) -> Option<FailureType> {
        self.failure_type
    }

    /// Per-type payload.
    pub fn body(&self) -> &NodeBody {
        &self.body
    }

    /// Command handle, for command nodes.
    pub fn command_handle(&self) -> Option<CommandHandle> {
        match &self.body {
            NodeBody::Command(body) => body.handle,
            _ => None,
        }
    }

    /// Number of completed re-entries into WAITING.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    pub(crate) fn activate(&mut self, kind: ConditionKind) -> Result<()> {
        if self.active.insert(kind) {
            Ok(())
        } else {
            Err(PlexecError::ConditionPairing {
                node: self.id,
                condition: kind,
                operation: "activation",
            })
        }
    }

    pub(crate) fn deactivate(&mut self, kind: ConditionKind) -> Result<()> {
        if self.active.remove(kind) {
            Ok(())
        } else {
            Err(PlexecError::ConditionPairing {
                node: self.id,
                condition: kind,
                operation: "deactivation",
            })
        }
    }

    /// Record the iteration's outcome. Written at most once per iteration.
    pub(crate) fn set_outcome(
        &mut self,
        outcome: Outcome,
        failure_type: Option<FailureType>,
    ) -> Result<()> {
        if let Some(existing) = self.outcome {
            return Err(PlexecError::OutcomeAlreadySet {
                node: self.id,
                existing,
            });
        }
        self.outcome = Some(outcome);
        self.failure_type = failure_type;
        Ok(())
    }

    /// Clear the outcome and per-iteration payload slots.
    pub(crate) fn reset(&mut self) {
        self.outcome = None;
        self.failure_type = None;
        self.body.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_node() -> Node {
        Node::new(NodeId::new(0), "A".to_string(), None, NodeBody::Empty)
    }

    #[test]
    fn activation_is_paired() {
        let mut node = empty_node();
        node.activate(ConditionKind::StartCondition).unwrap();
        assert!(node.is_active(ConditionKind::StartCondition));
        assert!(matches!(
            node.activate(ConditionKind::StartCondition),
            Err(PlexecError::ConditionPairing {
                operation: "activation",
                ..
            })
        ));
        node.deactivate(ConditionKind::StartCondition).unwrap();
        assert!(node.deactivate(ConditionKind::StartCondition).is_err());
    }

    #[test]
    fn outcome_is_write_once_until_reset() {
        let mut node = empty_node();
        node.set_outcome(Outcome::Failure, Some(FailureType::ParentFailed))
            .unwrap();
        assert!(matches!(
            node.set_outcome(Outcome::Success, None),
            Err(PlexecError::OutcomeAlreadySet {
                existing: Outcome::Failure,
                ..
            })
        ));
        node.reset();
        assert_eq!(node.outcome(), None);
        assert_eq!(node.failure_type(), None);
        node.set_outcome(Outcome::Success, None).unwrap();
    }
}
