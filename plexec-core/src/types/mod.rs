//! Core type definitions for the executive.

mod ids;
mod lifecycle;

pub use ids::{ActionId, NodeId, RunId};
pub use lifecycle::{CommandHandle, FailureType, NodeState, Outcome};
