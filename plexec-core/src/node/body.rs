//! Node types and their per-type payloads.

use crate::resource::ResourceRequest;
use crate::types::CommandHandle;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of plan node. Immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    /// No body; exists for its conditions.
    Empty,
    /// Writes a plan variable.
    Assignment,
    /// Sends a command to an external system.
    Command,
    /// Sends an update to the planner interface.
    Update,
    /// Sends a request to the planner interface.
    Request,
    /// Runs its children concurrently.
    List,
    /// Runs a registered library plan as its only child.
    LibraryNodeCall,
}

impl NodeType {
    /// Every node type.
    pub const ALL: [NodeType; 7] = [
        NodeType::Empty,
        NodeType::Assignment,
        NodeType::Command,
        NodeType::Update,
        NodeType::Request,
        NodeType::List,
        NodeType::LibraryNodeCall,
    ];

    /// Command, Update and Request nodes.
    pub fn is_action(&self) -> bool {
        matches!(self, Self::Command | Self::Update | Self::Request)
    }

    /// Node types that own children.
    pub fn has_children(&self) -> bool {
        matches!(self, Self::List | Self::LibraryNodeCall)
    }

    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Assignment => "Assignment",
            Self::Command => "Command",
            Self::Update => "Update",
            Self::Request => "Request",
            Self::List => "List",
            Self::LibraryNodeCall => "LibraryNodeCall",
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assignment payload.
#[derive(Debug, Clone)]
pub struct AssignmentBody {
    /// Destination variable.
    pub variable: String,
    /// Value written.
    pub value: Value,
    pub(crate) ack: Option<bool>,
    pub(crate) performed: bool,
}

impl AssignmentBody {
    /// Whether the assignment has been performed this iteration.
    pub fn ack(&self) -> Option<bool> {
        self.ack
    }
}

/// Command payload.
#[derive(Debug, Clone)]
pub struct CommandBody {
    /// Command name, used to select the handler.
    pub name: String,
    /// Arguments.
    pub args: Vec<Value>,
    /// Resources the command needs while running.
    pub resources: Vec<ResourceRequest>,
    /// Variable receiving the return value, if any.
    pub destination: Option<String>,
    pub(crate) handle: Option<CommandHandle>,
    pub(crate) abort_complete: Option<bool>,
    pub(crate) return_value: Option<Value>,
    pub(crate) serial: u64,
    pub(crate) denied: bool,
}

impl CommandBody {
    /// Current command handle.
    pub fn handle(&self) -> Option<CommandHandle> {
        self.handle
    }

    /// Abort acknowledgement.
    pub fn abort_complete(&self) -> Option<bool> {
        self.abort_complete
    }

    /// Return value, once reported.
    pub fn return_value(&self) -> Option<&Value> {
        self.return_value.as_ref()
    }

    /// Dispatch serial of the current execution.
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Check if arbitration refused the next execution.
    pub fn is_denied(&self) -> bool {
        self.denied
    }

    /// Priority used by resource arbitration: that of the first request.
    pub fn priority(&self) -> i32 {
        self.resources.first().map_or(0, |r| r.priority)
    }
}

/// Update and planner-request payload.
#[derive(Debug, Clone)]
pub struct UpdateBody {
    /// Name/value pairs sent.
    pub pairs: Vec<(String, Value)>,
    pub(crate) ack: Option<bool>,
    pub(crate) abort_complete: Option<bool>,
    pub(crate) serial: u64,
}

impl UpdateBody {
    /// Acknowledgement from the planner interface.
    pub fn ack(&self) -> Option<bool> {
        self.ack
    }

    /// Dispatch serial of the current execution.
    pub fn serial(&self) -> u64 {
        self.serial
    }
}

/// Runtime payload of a node, tagged by node type.
#[derive(Debug, Clone)]
pub enum NodeBody {
    /// Empty node.
    Empty,
    /// Assignment node.
    Assignment(AssignmentBody),
    /// Command node.
    Command(CommandBody),
    /// Update node.
    Update(UpdateBody),
    /// Planner request node.
    Request(UpdateBody),
    /// List node.
    List,
    /// Library call node; the library is expanded as the only child.
    LibraryNodeCall {
        /// Library name.
        library: String,
    },
}

impl NodeBody {
    /// Node type of this body.
    pub fn node_type(&self) -> NodeType {
        match self {
            Self::Empty => NodeType::Empty,
            Self::Assignment(_) => NodeType::Assignment,
            Self::Command(_) => NodeType::Command,
            Self::Update(_) => NodeType::Update,
            Self::Request(_) => NodeType::Request,
            Self::List => NodeType::List,
            Self::LibraryNodeCall { .. } => NodeType::LibraryNodeCall,
        }
    }

    /// Clear per-iteration slots.
    pub(crate) fn reset(&mut self) {
        match self {
            Self::Assignment(body) => {
                body.ack = None;
                body.performed = false;
            }
            Self::Command(body) => {
                body.handle = None;
                body.abort_complete = None;
                body.return_value = None;
                body.denied = false;
            }
            Self::Update(body) | Self::Request(body) => {
                body.ack = None;
                body.abort_complete = None;
            }
            Self::Empty | Self::List | Self::LibraryNodeCall { .. } => {}
        }
    }

    /// Abort acknowledgement for action nodes.
    pub(crate) fn abort_complete(&self) -> Option<bool> {
        match self {
            Self::Command(body) => body.abort_complete,
            Self::Update(body) | Self::Request(body) => body.abort_complete,
            _ => None,
        }
    }
}
