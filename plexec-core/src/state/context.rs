//! What state computers and transition handlers see.

use crate::error::Result;
use crate::interface::{CommandRequest, UpdateRequest};
use crate::node::{ConditionKind, ConditionSet, ExprContext, Node, NodeBody, PlanTree};
use crate::types::{FailureType, NodeId, NodeState, Outcome};
use crate::value::Value;

/// Read-only view of one node for a state computer.
///
/// Condition reads go through the activation check, so a computer that
/// reads a condition its state does not activate fails loudly.
pub struct NodeView<'a> {
    tree: &'a PlanTree,
    env: &'a dyn ExprContext,
    node: &'a Node,
}

impl<'a> NodeView<'a> {
    /// View a node.
    pub fn new(tree: &'a PlanTree, env: &'a dyn ExprContext, id: NodeId) -> Result<Self> {
        Ok(Self {
            tree,
            env,
            node: tree.node(id)?,
        })
    }

    /// The node.
    pub fn node(&self) -> &Node {
        self.node
    }

    /// Read an active condition.
    pub fn condition(&self, kind: ConditionKind) -> Result<Option<bool>> {
        self.tree.condition(self.node.id(), kind, self.env)
    }

    /// Condition is known true.
    pub fn is_true(&self, kind: ConditionKind) -> Result<bool> {
        Ok(self.condition(kind)? == Some(true))
    }

    /// Condition is known false.
    pub fn is_false(&self, kind: ConditionKind) -> Result<bool> {
        Ok(self.condition(kind)? == Some(false))
    }
}

/// A variable assignment waiting to be performed after quiescence.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRequest {
    /// The assignment node.
    pub node: NodeId,
    /// Destination variable.
    pub variable: String,
    /// Value to write.
    pub value: Value,
}

/// Side effects produced by transition handlers.
///
/// The scheduler applies releases and variable resets right after each
/// transition and holds the rest until the step is quiescent.
#[derive(Debug, Default)]
pub struct Effects {
    /// Commands to dispatch.
    pub commands: Vec<CommandRequest>,
    /// Commands to abort.
    pub aborts: Vec<CommandRequest>,
    /// Updates and planner requests to send.
    pub updates: Vec<UpdateRequest>,
    /// Assignments to perform.
    pub assignments: Vec<AssignmentRequest>,
    /// Command nodes whose resources are to be released.
    pub releases: Vec<NodeId>,
    /// Variables to reset to unknown.
    pub variable_resets: Vec<String>,
}

impl Effects {
    /// Check if nothing is pending.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
            && self.aborts.is_empty()
            && self.updates.is_empty()
            && self.assignments.is_empty()
            && self.releases.is_empty()
            && self.variable_resets.is_empty()
    }
}

/// Mutable access to one node during a transition.
pub struct TransitionContext<'a> {
    /// The plan tree.
    pub tree: &'a mut PlanTree,
    /// External data for condition reads.
    pub env: &'a dyn ExprContext,
    /// Effects sink.
    pub effects: &'a mut Effects,
    /// The transitioning node.
    pub node: NodeId,
}

impl<'a> TransitionContext<'a> {
    /// Build a context.
    pub fn new(
        tree: &'a mut PlanTree,
        env: &'a dyn ExprContext,
        effects: &'a mut Effects,
        node: NodeId,
    ) -> Self {
        Self {
            tree,
            env,
            effects,
            node,
        }
    }

    /// Read an active condition.
    pub fn condition(&self, kind: ConditionKind) -> Result<Option<bool>> {
        self.tree.condition(self.node, kind, self.env)
    }

    /// Condition is known true.
    pub fn is_true(&self, kind: ConditionKind) -> Result<bool> {
        Ok(self.condition(kind)? == Some(true))
    }

    /// Condition is known false.
    pub fn is_false(&self, kind: ConditionKind) -> Result<bool> {
        Ok(self.condition(kind)? == Some(false))
    }

    /// The node.
    pub fn node(&self) -> Result<&Node> {
        self.tree.node(self.node)
    }

    pub(crate) fn node_mut(&mut self) -> Result<&mut Node> {
        self.tree.node_mut(self.node)
    }

    pub(crate) fn activate(&mut self, conditions: ConditionSet) -> Result<()> {
        let node = self.node_mut()?;
        conditions.iter().try_for_each(|kind| node.activate(kind))
    }

    pub(crate) fn deactivate(&mut self, conditions: ConditionSet) -> Result<()> {
        let node = self.node_mut()?;
        conditions.iter().try_for_each(|kind| node.deactivate(kind))
    }

    /// Activate a state's conditions and write the state.
    pub(crate) fn enter(&mut self, state: NodeState, conditions: ConditionSet) -> Result<()> {
        self.activate(conditions)?;
        self.node_mut()?.state = state;
        Ok(())
    }

    pub(crate) fn set_outcome(
        &mut self,
        outcome: Outcome,
        failure_type: Option<FailureType>,
    ) -> Result<()> {
        self.node_mut()?.set_outcome(outcome, failure_type)
    }

    pub(crate) fn fail(&mut self, failure_type: FailureType) -> Result<()> {
        self.set_outcome(Outcome::Failure, Some(failure_type))
    }

    /// Record the failure behind a FAILING destination. A parent failure
    /// wins over the node's own invariant.
    pub(crate) fn fail_invariant(&mut self) -> Result<()> {
        if self.is_false(ConditionKind::AncestorInvariantCondition)? {
            self.fail(FailureType::ParentFailed)
        } else {
            self.fail(FailureType::InvariantConditionFailed)
        }
    }

    /// Outcome of a normal end: the invariant, then the post-condition.
    pub(crate) fn finish_by_post(&mut self) -> Result<()> {
        if self.is_false(ConditionKind::InvariantCondition)? {
            self.fail(FailureType::InvariantConditionFailed)
        } else if self.is_true(ConditionKind::PostCondition)? {
            self.set_outcome(Outcome::Success, None)
        } else {
            self.fail(FailureType::PostConditionFailed)
        }
    }

    pub(crate) fn reset(&mut self) -> Result<()> {
        self.node_mut()?.reset();
        Ok(())
    }

    /// Queue the node's resources for release, if it is a command.
    pub(crate) fn release_resources(&mut self) -> Result<()> {
        if matches!(self.node()?.body(), NodeBody::Command(_)) {
            self.effects.releases.push(self.node);
        }
        Ok(())
    }
}
