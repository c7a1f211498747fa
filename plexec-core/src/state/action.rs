//! Command, Update and Request nodes.
//!
//! These skip FINISHING. A failure while the action is outstanding aborts
//! it and waits in FAILING for the abort to be acknowledged. A command
//! refused by arbitration still enters EXECUTING, holding COMMAND_DENIED,
//! and its end and post conditions decide the outcome.

use super::base::base_table;
use super::context::{NodeView, TransitionContext};
use super::table::{StateHandler, TypeStateTable};
use crate::error::Result;
use crate::interface::{CommandRequest, UpdateKind, UpdateRequest};
use crate::node::{ConditionKind::*, ConditionSet, NodeBody};
use crate::types::{ActionId, CommandHandle, FailureType, NodeState};
use tracing::debug;

pub(crate) const EXECUTING: ConditionSet = ConditionSet::of(&[
    AncestorInvariantCondition,
    InvariantCondition,
    EndCondition,
    PostCondition,
    CommandHandleReceivedCondition,
]);

pub(crate) const FAILING: ConditionSet = ConditionSet::of(&[AbortCompleteCondition]);

/// Table for Command, Update and Request nodes.
pub fn action_table() -> TypeStateTable {
    base_table()
        .specialize("action")
        .with_state(
            NodeState::Executing,
            StateHandler {
                compute: executing_dest,
                exit: exit_executing,
                enter: enter_executing,
                conditions: EXECUTING,
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

fn executing_dest(view: &NodeView<'_>) -> Result<NodeState> {
    let ended = view.is_true(EndCondition)?;
    if view.is_false(AncestorInvariantCondition)? {
        return Ok(if ended {
            NodeState::Finished
        } else {
            NodeState::Failing
        });
    }
    if view.is_false(InvariantCondition)? {
        return Ok(if ended {
            NodeState::IterationEnded
        } else {
            NodeState::Failing
        });
    }
    if ended && view.is_true(CommandHandleReceivedCondition)? {
        return Ok(NodeState::IterationEnded);
    }
    Ok(NodeState::NoState)
}

fn exit_executing(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    match dest {
        NodeState::Failing => {
            ctx.fail_invariant()?;
            abort(ctx)?;
        }
        NodeState::Finished => ctx.fail(FailureType::ParentFailed)?,
        _ => ctx.finish_by_post()?,
    }
    ctx.deactivate(EXECUTING)?;
    if dest != NodeState::Failing {
        ctx.release_resources()?;
    }
    Ok(())
}

fn enter_executing(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Executing, EXECUTING)?;
    execute(ctx)
}

fn failing_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if !view.is_true(AbortCompleteCondition)? {
        return Ok(NodeState::NoState);
    }
    if view.node().failure_type() == Some(FailureType::ParentFailed) {
        Ok(NodeState::Finished)
    } else {
        Ok(NodeState::IterationEnded)
    }
}

fn exit_failing(ctx: &mut TransitionContext<'_>, _dest: NodeState) -> Result<()> {
    ctx.deactivate(FAILING)?;
    ctx.release_resources()
}

fn enter_failing(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Failing, FAILING)
}

/// Start the node's action: a new dispatch serial and a queued request.
fn execute(ctx: &mut TransitionContext<'_>) -> Result<()> {
    let id = ctx.node;
    let node = ctx.tree.node_mut(id)?;
    let node_name = node.name.clone();
    let kind = match node.body {
        NodeBody::Request(_) => UpdateKind::PlannerRequest,
        _ => UpdateKind::Update,
    };
    match &mut node.body {
        NodeBody::Command(body) if body.denied => {
            body.serial += 1;
            body.denied = false;
            body.handle = Some(CommandHandle::Denied);
            body.abort_complete = None;
            body.return_value = None;
            debug!(node = %id, command = %body.name, "Command denied, not dispatched");
        }
        NodeBody::Command(body) => {
            body.serial += 1;
            body.handle = None;
            body.abort_complete = None;
            body.return_value = None;
            debug!(node = %id, command = %body.name, serial = body.serial, "Command queued");
            ctx.effects.commands.push(CommandRequest {
                action: ActionId::new(id, body.serial),
                node_name,
                name: body.name.clone(),
                args: body.args.clone(),
            });
        }
        NodeBody::Update(body) | NodeBody::Request(body) => {
            body.serial += 1;
            body.ack = None;
            body.abort_complete = None;
            ctx.effects.updates.push(UpdateRequest {
                action: ActionId::new(id, body.serial),
                node_name,
                kind,
                pairs: body.pairs.clone(),
            });
        }
        _ => {}
    }
    Ok(())
}

/// Abort the outstanding action. Updates and requests cannot be recalled,
/// so their abort completes at once.
fn abort(ctx: &mut TransitionContext<'_>) -> Result<()> {
    let id = ctx.node;
    let node = ctx.tree.node_mut(id)?;
    let node_name = node.name.clone();
    match &mut node.body {
        NodeBody::Command(body) => {
            debug!(node = %id, command = %body.name, "Command abort queued");
            ctx.effects.aborts.push(CommandRequest {
                action: ActionId::new(id, body.serial),
                node_name,
                name: body.name.clone(),
                args: body.args.clone(),
            });
        }
        NodeBody::Update(body) | NodeBody::Request(body) => {
            body.abort_complete = Some(true);
        }
        _ => {}
    }
    Ok(())
}
