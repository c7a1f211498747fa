//! Mapping from node types to state tables, and the transition driver.

use super::action::action_table;
use super::context::{Effects, NodeView, TransitionContext};
use super::default::default_table;
use super::list::{library_call_table, list_table};
use super::table::{StateHandler, TypeStateTable};
use crate::error::{PlexecError, Result};
use crate::node::{ExprContext, NodeType, PlanTree};
use crate::types::{NodeId, NodeState};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// States a node of the given type can reach.
pub fn reachable_states(node_type: NodeType) -> &'static [NodeState] {
    use NodeState::*;
    match node_type {
        NodeType::Empty | NodeType::Assignment => {
            &[Inactive, Waiting, Executing, IterationEnded, Finished]
        }
        NodeType::Command | NodeType::Update | NodeType::Request => {
            &[Inactive, Waiting, Executing, Failing, IterationEnded, Finished]
        }
        NodeType::List | NodeType::LibraryNodeCall => &[
            Inactive,
            Waiting,
            Executing,
            Finishing,
            Failing,
            IterationEnded,
            Finished,
        ],
    }
}

/// State tables keyed by node type.
///
/// Built once at start-up and shared read-only by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct StateTableRegistry {
    tables: HashMap<NodeType, Arc<TypeStateTable>>,
}

impl StateTableRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The standard registry: every node type with its table, validated.
    pub fn standard() -> Result<Self> {
        let default = Arc::new(default_table());
        let action = Arc::new(action_table());
        let list = Arc::new(list_table());
        let library = Arc::new(library_call_table()?);

        let mut registry = Self::new();
        registry.register(NodeType::Empty, Arc::clone(&default));
        registry.register(NodeType::Assignment, default);
        registry.register(NodeType::Command, Arc::clone(&action));
        registry.register(NodeType::Update, Arc::clone(&action));
        registry.register(NodeType::Request, action);
        registry.register(NodeType::List, list);
        registry.register(NodeType::LibraryNodeCall, library);
        registry.validate()?;
        Ok(registry)
    }

    /// Register the table for a node type, replacing any previous one.
    pub fn register(&mut self, node_type: NodeType, table: Arc<TypeStateTable>) {
        self.tables.insert(node_type, table);
    }

    /// Check that every node type has a table covering its reachable states.
    pub fn validate(&self) -> Result<()> {
        for node_type in NodeType::ALL {
            let table = self.table(node_type)?;
            if let Some(state) = reachable_states(node_type)
                .iter()
                .find(|s| table.get(**s).is_none())
            {
                return Err(PlexecError::MissingStateHandler {
                    table: table.name().to_string(),
                    state: *state,
                });
            }
        }
        Ok(())
    }

    /// Table for a node type.
    pub fn table(&self, node_type: NodeType) -> Result<&TypeStateTable> {
        self.tables
            .get(&node_type)
            .map(Arc::as_ref)
            .ok_or(PlexecError::MissingStateTable { node_type })
    }

    /// Handler for a node type in a state.
    pub fn handler(&self, node_type: NodeType, state: NodeState) -> Result<&StateHandler> {
        let table = self.table(node_type)?;
        table.get(state).ok_or_else(|| PlexecError::MissingStateHandler {
            table: table.name().to_string(),
            state,
        })
    }

    /// Destination state of a node, or NO_STATE.
    pub fn dest_state(
        &self,
        tree: &PlanTree,
        env: &dyn ExprContext,
        id: NodeId,
    ) -> Result<NodeState> {
        let view = NodeView::new(tree, env, id)?;
        let node = view.node();
        let handler = self.handler(node.node_type(), node.state())?;
        (handler.compute)(&view)
    }

    /// Move a node to a new state: exit the old state, then enter the new.
    pub fn transition(
        &self,
        tree: &mut PlanTree,
        env: &dyn ExprContext,
        effects: &mut Effects,
        id: NodeId,
        dest: NodeState,
    ) -> Result<()> {
        let node = tree.node(id)?;
        let (node_type, from) = (node.node_type(), node.state());
        let table = self.table(node_type)?;
        let no_handler = || PlexecError::NoTransitionHandler {
            node: id,
            node_type,
            from,
            to: dest,
        };
        let exit = table.get(from).ok_or_else(no_handler)?.exit;
        let enter = table.get(dest).ok_or_else(no_handler)?.enter;

        trace!(node = %id, from = %from, to = %dest, "Transition");
        let mut ctx = TransitionContext::new(tree, env, effects, id);
        exit(&mut ctx, dest)?;
        enter(&mut ctx)
    }

    /// Activate the INACTIVE conditions of a freshly inserted node.
    pub fn initialize(
        &self,
        tree: &mut PlanTree,
        env: &dyn ExprContext,
        effects: &mut Effects,
        id: NodeId,
    ) -> Result<()> {
        let node_type = tree.node(id)?.node_type();
        let enter = self.handler(node_type, NodeState::Inactive)?.enter;
        let mut ctx = TransitionContext::new(tree, env, effects, id);
        enter(&mut ctx)
    }

    /// Check that a node's active conditions are exactly those its state
    /// requires.
    pub fn verify_activation(&self, tree: &PlanTree, id: NodeId) -> Result<()> {
        let node = tree.node(id)?;
        let required = self.handler(node.node_type(), node.state())?.conditions;
        let active = node.active_conditions();
        if let Some(extra) = active.iter().find(|k| !required.contains(*k)) {
            return Err(PlexecError::ConditionPairing {
                node: id,
                condition: extra,
                operation: "stale activation",
            });
        }
        if let Some(missing) = required.iter().find(|k| !active.contains(*k)) {
            return Err(PlexecError::ConditionPairing {
                node: id,
                condition: missing,
                operation: "missing activation",
            });
        }
        Ok(())
    }
}
