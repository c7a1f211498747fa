//! States every node type shares: INACTIVE, WAITING, ITERATION_ENDED and
//! FINISHED.

use super::context::{NodeView, TransitionContext};
use super::table::{StateHandler, TableBuilder, TypeStateTable};
use crate::error::Result;
use crate::node::{ConditionKind::*, ConditionSet};
use crate::types::{FailureType, NodeState, Outcome};

pub(crate) const INACTIVE: ConditionSet =
    ConditionSet::of(&[ParentExecutingCondition, ParentFinishedCondition]);

pub(crate) const WAITING: ConditionSet = ConditionSet::of(&[
    StartCondition,
    PreCondition,
    SkipCondition,
    AncestorEndCondition,
    AncestorInvariantCondition,
]);

pub(crate) const ITERATION_ENDED: ConditionSet = ConditionSet::of(&[
    RepeatCondition,
    AncestorEndCondition,
    AncestorInvariantCondition,
]);

pub(crate) const FINISHED: ConditionSet = ConditionSet::of(&[ParentWaitingCondition]);

/// The table of shared states. Type tables specialize it.
pub fn base_table() -> TypeStateTable {
    TableBuilder::new("base")
        .with_state(
            NodeState::Inactive,
            StateHandler {
                compute: inactive_dest,
                exit: exit_inactive,
                enter: enter_inactive,
                conditions: INACTIVE,
            },
        )
        .with_state(
            NodeState::Waiting,
            StateHandler {
                compute: waiting_dest,
                exit: exit_waiting,
                enter: enter_waiting,
                conditions: WAITING,
            },
        )
        .with_state(
            NodeState::IterationEnded,
            StateHandler {
                compute: iteration_ended_dest,
                exit: exit_iteration_ended,
                enter: enter_iteration_ended,
                conditions: ITERATION_ENDED,
            },
        )
        .with_state(
            NodeState::Finished,
            StateHandler {
                compute: finished_dest,
                exit: exit_finished,
                enter: enter_finished,
                conditions: FINISHED,
            },
        )
        .build()
}

// INACTIVE

fn inactive_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if view.is_true(ParentFinishedCondition)? {
        Ok(NodeState::Finished)
    } else if view.is_true(ParentExecutingCondition)? {
        Ok(NodeState::Waiting)
    } else {
        Ok(NodeState::NoState)
    }
}

fn exit_inactive(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    ctx.deactivate(INACTIVE)?;
    if dest == NodeState::Finished {
        ctx.set_outcome(Outcome::Skipped, None)?;
    }
    Ok(())
}

pub(crate) fn enter_inactive(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Inactive, INACTIVE)
}

// WAITING

fn waiting_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if view.is_false(AncestorInvariantCondition)?
        || view.is_true(AncestorEndCondition)?
        || view.is_true(SkipCondition)?
    {
        return Ok(NodeState::Finished);
    }
    if view.is_true(StartCondition)? {
        if view.is_true(PreCondition)? {
            return Ok(NodeState::Executing);
        }
        return Ok(NodeState::IterationEnded);
    }
    Ok(NodeState::NoState)
}

fn exit_waiting(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    ctx.deactivate(WAITING)?;
    match dest {
        NodeState::Finished => ctx.set_outcome(Outcome::Skipped, None),
        NodeState::IterationEnded => ctx.fail(FailureType::PreConditionFailed),
        _ => Ok(()),
    }
}

fn enter_waiting(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Waiting, WAITING)
}

// ITERATION_ENDED

fn iteration_ended_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if view.is_false(AncestorInvariantCondition)?
        || view.is_true(AncestorEndCondition)?
        || view.is_false(RepeatCondition)?
    {
        Ok(NodeState::Finished)
    } else if view.is_true(RepeatCondition)? {
        Ok(NodeState::Waiting)
    } else {
        Ok(NodeState::NoState)
    }
}

fn exit_iteration_ended(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    ctx.deactivate(ITERATION_ENDED)?;
    if dest == NodeState::Waiting {
        ctx.reset()?;
        ctx.node_mut()?.iteration += 1;
    }
    Ok(())
}

fn enter_iteration_ended(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::IterationEnded, ITERATION_ENDED)
}

// FINISHED

fn finished_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if view.is_true(ParentWaitingCondition)? {
        Ok(NodeState::Inactive)
    } else {
        Ok(NodeState::NoState)
    }
}

fn exit_finished(ctx: &mut TransitionContext<'_>, _dest: NodeState) -> Result<()> {
    ctx.deactivate(FINISHED)?;
    ctx.reset()
}

fn enter_finished(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Finished, FINISHED)
}
