//! Boolean condition expressions.
//!
//! Values are three-valued: `Some(true)`, `Some(false)` and `None` for
//! UNKNOWN. Connectives follow Kleene logic.

use crate::types::{CommandHandle, NodeState, Outcome};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// Source of external data for expression evaluation.
pub trait ExprContext {
    /// Current value of a named external state. Unknown if never reported.
    fn lookup(&self, state: &str) -> Value;

    /// Current value of a plan variable. Unknown if never assigned.
    fn variable(&self, name: &str) -> Value;
}

/// An [`ExprContext`] with no data. Every lookup and variable is unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyContext;

impl ExprContext for EmptyContext {
    fn lookup(&self, _state: &str) -> Value {
        Value::unknown()
    }

    fn variable(&self, _name: &str) -> Value {
        Value::unknown()
    }
}

/// A user condition expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// A literal; `None` is UNKNOWN.
    Const(Option<bool>),
    /// Boolean value of an external state.
    Lookup(String),
    /// Boolean value of a plan variable.
    Variable(String),
    /// An external state equals a value.
    LookupEquals {
        /// State name.
        state: String,
        /// Value to compare against.
        value: Value,
    },
    /// A plan variable equals a value.
    VariableEquals {
        /// Variable name.
        name: String,
        /// Value to compare against.
        value: Value,
    },
    /// Another node is in a given state.
    NodeState {
        /// Node name.
        node: String,
        /// Expected state.
        state: NodeState,
    },
    /// Another node finished with a given outcome.
    NodeOutcome {
        /// Node name.
        node: String,
        /// Expected outcome.
        outcome: Outcome,
    },
    /// The owning command node's handle equals a value.
    CommandHandle(CommandHandle),
    /// Negation.
    Not(Box<Expr>),
    /// Conjunction.
    And(Vec<Expr>),
    /// Disjunction.
    Or(Vec<Expr>),
}

impl Expr {
    /// The constant TRUE.
    pub fn truth() -> Self {
        Self::Const(Some(true))
    }

    /// The constant FALSE.
    pub fn falsity() -> Self {
        Self::Const(Some(false))
    }

    /// The constant UNKNOWN.
    pub fn unknown() -> Self {
        Self::Const(None)
    }

    /// Boolean lookup of a named state.
    pub fn lookup(state: impl Into<String>) -> Self {
        Self::Lookup(state.into())
    }

    /// Boolean plan variable.
    pub fn variable(name: impl Into<String>) -> Self {
        Self::Variable(name.into())
    }

    /// A named node is in the given state.
    pub fn node_state(node: impl Into<String>, state: NodeState) -> Self {
        Self::NodeState {
            node: node.into(),
            state,
        }
    }

    /// A named node finished with the given outcome.
    pub fn node_outcome(node: impl Into<String>, outcome: Outcome) -> Self {
        Self::NodeOutcome {
            node: node.into(),
            outcome,
        }
    }

    /// Negate this expression.
    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        Self::Not(Box::new(self))
    }
}

/// Kleene conjunction.
pub fn and3(values: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for value in values {
        match value {
            Some(false) => return Some(false),
            None => unknown = true,
            Some(true) => {}
        }
    }
    if unknown { None } else { Some(true) }
}

/// Kleene disjunction.
pub fn or3(values: impl IntoIterator<Item = Option<bool>>) -> Option<bool> {
    let mut unknown = false;
    for value in values {
        match value {
            Some(true) => return Some(true),
            None => unknown = true,
            Some(false) => {}
        }
    }
    if unknown { None } else { Some(false) }
}
