//! Per-type state tables.

use super::context::{NodeView, TransitionContext};
use crate::error::{PlexecError, Result};
use crate::node::ConditionSet;
use crate::types::NodeState;
use std::fmt;

/// Computes a node's destination state. Side-effect free.
pub type StateComputer = fn(&NodeView<'_>) -> Result<NodeState>;

/// Runs before the state write: deactivates the old state's conditions and
/// records the outcome. Receives the destination.
pub type ExitHandler = fn(&mut TransitionContext<'_>, NodeState) -> Result<()>;

/// Activates the new state's conditions, writes the state and runs the
/// node's domain behaviour.
pub type EntryHandler = fn(&mut TransitionContext<'_>) -> Result<()>;

/// Everything a table knows about one state.
#[derive(Clone, Copy)]
pub struct StateHandler {
    /// Destination computer while in the state.
    pub compute: StateComputer,
    /// Handler for leaving the state.
    pub exit: ExitHandler,
    /// Handler for entering the state.
    pub enter: EntryHandler,
    /// Conditions active while in the state.
    pub conditions: ConditionSet,
}

impl fmt::Debug for StateHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateHandler")
            .field("conditions", &self.conditions)
            .finish_non_exhaustive()
    }
}

/// State handlers for one family of node types, indexed by state.
#[derive(Debug, Clone)]
pub struct TypeStateTable {
    name: String,
    handlers: [Option<StateHandler>; NodeState::COUNT],
}

impl TypeStateTable {
    /// Table name, used in diagnostics.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Handler for a state.
    pub fn get(&self, state: NodeState) -> Option<&StateHandler> {
        self.handlers[state.index()].as_ref()
    }

    /// States this table handles.
    pub fn states(&self) -> impl Iterator<Item = NodeState> + '_ {
        NodeState::ALL
            .into_iter()
            .filter(move |state| self.get(*state).is_some())
    }

    /// Start a specialization of this table.
    pub fn specialize(&self, name: impl Into<String>) -> TableBuilder {
        TableBuilder {
            table: TypeStateTable {
                name: name.into(),
                handlers: self.handlers,
            },
            base: self.name.clone(),
        }
    }
}

/// Builds a [`TypeStateTable`] from a base.
pub struct TableBuilder {
    table: TypeStateTable,
    base: String,
}

impl TableBuilder {
    /// Start an empty table.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            base: name.clone(),
            table: TypeStateTable {
                name,
                handlers: [None; NodeState::COUNT],
            },
        }
    }

    /// Add or replace the handler for a state.
    pub fn with_state(mut self, state: NodeState, handler: StateHandler) -> Self {
        self.table.handlers[state.index()] = Some(handler);
        self
    }

    /// Replace the handler for a state the base already handles.
    ///
    /// Specializing a state the base leaves unhandled is a configuration
    /// error rather than a silent addition.
    pub fn override_state(mut self, state: NodeState, handler: StateHandler) -> Result<Self> {
        if self.table.handlers[state.index()].is_none() {
            return Err(PlexecError::InvalidSpecialization {
                table: self.base,
                state,
            });
        }
        self.table.handlers[state.index()] = Some(handler);
        Ok(self)
    }

    /// Finish the table.
    pub fn build(self) -> TypeStateTable {
        self.table
    }
}
