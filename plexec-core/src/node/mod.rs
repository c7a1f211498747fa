//! Plan nodes, their conditions and the tree that owns them.

mod body;
mod condition;
mod expr;
#[allow(clippy::module_inception)]
mod node;
mod spec;
mod tree;

pub use body::{AssignmentBody, CommandBody, NodeBody, NodeType, UpdateBody};
pub use condition::{ConditionKind, ConditionSet};
pub use expr::{EmptyContext, Expr, ExprContext, and3, or3};
pub use node::Node;
pub use spec::{BodySpec, NodeSpec};
pub use tree::PlanTree;
