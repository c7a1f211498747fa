//! Empty and Assignment nodes: EXECUTING leads straight to
//! ITERATION_ENDED or FINISHED.

use super::base::base_table;
use super::context::{AssignmentRequest, NodeView, TransitionContext};
use super::table::{StateHandler, TypeStateTable};
use crate::error::Result;
use crate::node::{ConditionKind::*, ConditionSet, NodeBody};
use crate::types::{FailureType, NodeState, Outcome};

pub(crate) const EXECUTING: ConditionSet = ConditionSet::of(&[
    AncestorInvariantCondition,
    InvariantCondition,
    EndCondition,
    PostCondition,
]);

/// Table for Empty and Assignment nodes.
pub fn default_table() -> TypeStateTable {
    base_table()
        .specialize("default")
        .with_state(
            NodeState::Executing,
            StateHandler {
                compute: executing_dest,
                exit: exit_executing,
                enter: enter_executing,
                conditions: EXECUTING,
            },
        )
        .build()
}

fn executing_dest(view: &NodeView<'_>) -> Result<NodeState> {
    if view.is_false(AncestorInvariantCondition)? {
        Ok(NodeState::Finished)
    } else if view.is_false(InvariantCondition)? || view.is_true(EndCondition)? {
        Ok(NodeState::IterationEnded)
    } else {
        Ok(NodeState::NoState)
    }
}

fn exit_executing(ctx: &mut TransitionContext<'_>, dest: NodeState) -> Result<()> {
    if dest == NodeState::Finished {
        ctx.fail(FailureType::ParentFailed)?;
    } else {
        ctx.finish_by_post()?;
    }
    ctx.deactivate(EXECUTING)?;

    let node = ctx.node()?;
    if node.outcome() == Some(Outcome::Failure) {
        if let NodeBody::Assignment(body) = node.body() {
            if body.performed {
                let variable = body.variable.clone();
                ctx.effects.variable_resets.push(variable);
            }
        }
    }
    Ok(())
}

fn enter_executing(ctx: &mut TransitionContext<'_>) -> Result<()> {
    ctx.enter(NodeState::Executing, EXECUTING)?;
    let node = ctx.node()?;
    if let NodeBody::Assignment(body) = node.body() {
        let request = AssignmentRequest {
            node: node.id(),
            variable: body.variable.clone(),
            value: body.value.clone(),
        };
        ctx.effects.assignments.push(request);
    }
    Ok(())
}
