//! The boundary between the executive and the external world.
//!
//! The scheduler hands outgoing actions to an [`ExternalInterface`] after
//! each quiescent step. Replies come back later, through the input queue,
//! tagged with the [`ActionId`] of the dispatch they answer.

use crate::types::ActionId;
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A command dispatch or abort.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    /// Dispatch identity.
    pub action: ActionId,
    /// Name of the issuing node.
    pub node_name: String,
    /// Command name.
    pub name: String,
    /// Arguments.
    pub args: Vec<Value>,
}

/// Kind of planner message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    /// Update from an Update node.
    Update,
    /// Planner request from a Request node.
    PlannerRequest,
}

/// An update or planner request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRequest {
    /// Dispatch identity.
    pub action: ActionId,
    /// Name of the issuing node.
    pub node_name: String,
    /// Update or planner request.
    pub kind: UpdateKind,
    /// Name/value pairs.
    pub pairs: Vec<(String, Value)>,
}

/// Outgoing half of the adapter layer.
///
/// Implementations must not block and must not call back into the
/// executive synchronously; replies go through the input queue.
pub trait ExternalInterface: Send + Sync {
    /// Start a command.
    fn execute_command(&self, command: &CommandRequest);

    /// Ask for a running command to be aborted.
    fn abort_command(&self, command: &CommandRequest);

    /// Send an update or planner request.
    fn send_update(&self, update: &UpdateRequest);

    /// Start every command admitted in one step.
    fn batch_actions(&self, commands: &[CommandRequest]) {
        for command in commands {
            self.execute_command(command);
        }
    }
}

/// An interface that drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullInterface;

impl ExternalInterface for NullInterface {
    fn execute_command(&self, _command: &CommandRequest) {}

    fn abort_command(&self, _command: &CommandRequest) {}

    fn send_update(&self, _update: &UpdateRequest) {}
}
