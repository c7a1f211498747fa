//! List and LibraryNodeCall nodes.
//!
//! A list stays EXECUTING until its end condition holds, then waits in
//! FINISHING for its children to settle. A failure while executing or
//! finishing goes through FAILING, which also waits for the children.
//!
//! Library calls differ only in keeping their invariant active through
//! FINISHING.

use super::base::base_table;
use super::context::{NodeView, TransitionContext};
use super::table::{StateHandler, TypeStateTable};
use crate::error::Result;
use crate::node::{ConditionKind::*, ConditionSet};
use crate::types::{FailureType, NodeState, Outcome};

pub(crate) const EXECUTING: ConditionSet = ConditionSet::of(&[
    AncestorInvariantCondition,
    InvariantCondition,
    EndCondition,
]);

pub(crate) const FINISHING: ConditionSet = ConditionSet::of(&[
    AncestorInvariantCondition,
    ChildrenWaitingOrFinishedCondition,
    PostCondition,
]);

pub(crate) const LIBRARY_FINISHING: ConditionSet = ConditionSet::of(&[
    AncestorInvariantCondition,
    InvariantCondition,
    ChildrenWaitingOrFinishedCondition,
    PostCondition,
]);

pub(crate) const FAILING: ConditionSet = ConditionSet::of(&[ChildrenWaitingOrFinishedCondition]);

/// Table for List nodes.
pub fn list_table() -> TypeStateTable {
    base_table()
        .specialize("list")
        .with_state(
            NodeState::Executing,
            StateHandler {
                compute: executing_dest,
                exit: exit_list_executing,
                enter: enter_executing,
                conditions: EXECUTING,
            },
        )
        .with_state(
            NodeState::Finishing,
            StateHandler {
                compute: list_finishing_dest,
                exit: exit_list_finishing,
                enter: enter_finishing,
                conditions: FINISHING,
            },
        )
        .with_state(
            NodeState::Failing,
            StateHandler {
                compute: failing_dest,
                exit: exit_failing,
                enter: enter_failing,
                conditions: FAILING,
            },
        )
        .build()
}

/// Table for LibraryNodeCall nodes: the list table with EXECUTING and
/// FINISHING specialized.
pub fn library_call_table() -> Result<TypeStateTable> {
    Ok(list_table()
        .specialize("library_call")
        .override_state(
            NodeState::Executing,
            StateHandler {
                compute: executing_dest,
                exit: exit_library_executing,
                enter: enter_executing,
                conditions: EXECUTING,
            },
        )?
        .override_state(
            NodeState::Finishing,
            StateHandler {
                compute: library_finishing_dest,
                exit: exit_library_finishing,
                enter: enter_finishing,
                conditions: LIBRARY_FINISHING,
            },
        )?
        .build())
}

// EXECUTING

fn executing_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if view.is_false(AncestorInvariantCondition)? || view.is_false(InvariantCondition)? {
        Ok(NodeState::Failing)
    } else if view.is_true(EndCondition)? {
        Ok(NodeState::Finishing)
    } else {
        Ok(NodeState::NoState)
    }
}

fn exit_list_executing(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    if dest == NodeState::Failing {
        ctx.fail_invariant()?;
    }
    ctx.deactivate(EXECUTING)
}

fn exit_library_executing(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    if dest == NodeState::Failing {
        ctx.fail_invariant()?;
    }
    if dest == NodeState::Finishing {
        ctx.deactivate(ConditionSet::of(&[AncestorInvariantCondition, EndCondition]))
    } else {
        ctx.deactivate(EXECUTING)
    }
}

fn enter_executing(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Executing, EXECUTING)
}

// FINISHING

fn list_finishing_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if view.is_false(AncestorInvariantCondition)? {
        Ok(NodeState::Failing)
    } else if view.is_true(ChildrenWaitingOrFinishedCondition)? {
        Ok(NodeState::IterationEnded)
    } else {
        Ok(NodeState::NoState)
    }
}

fn library_finishing_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if view.is_false(AncestorInvariantCondition)? || view.is_false(InvariantCondition)? {
        Ok(NodeState::Failing)
    } else if view.is_true(ChildrenWaitingOrFinishedCondition)? {
        Ok(NodeState::IterationEnded)
    } else {
        Ok(NodeState::NoState)
    }
}

fn finishing_outcome(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    if dest == NodeState::Failing {
        ctx.fail_invariant()
    } else if ctx.is_true(PostCondition)? {
        ctx.set_outcome(Outcome::Success, None)
    } else {
        ctx.fail(FailureType::PostConditionFailed)
    }
}

fn exit_list_finishing(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    finishing_outcome(ctx, dest)?;
    ctx.deactivate(FINISHING)
}

fn exit_library_finishing(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    finishing_outcome(ctx, dest)?;
    ctx.deactivate(LIBRARY_FINISHING)
}

fn enter_finishing(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Finishing, FINISHING)
}

// FAILING

fn failing_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if !view.is_true(ChildrenWaitingOrFinishedCondition)? {
        return Ok(NodeState::NoState);
    }
    if view.node().failure_type() == Some(FailureType::ParentFailed) {
        Ok(NodeState::Finished)
    } else {
        Ok(NodeState::IterationEnded)
    }
}

fn exit_failing(ctx: &mut TransitionContext<'_>, _dest: NodeState) -> Result<()> {
    ctx.deactivate(FAILING)
}

fn enter_failing(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Failing, FAILING)
}
