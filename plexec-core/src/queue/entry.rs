//! Input queue records.

use crate::node::NodeSpec;
use crate::types::{ActionId, CommandHandle};
use crate::value::Value;
use serde::{Deserialize, Serialize};

/// A message passed through to the state cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Sender identity.
    pub sender: String,
    /// Opaque payload.
    pub payload: Value,
}

impl Message {
    /// Create a message.
    pub fn new(sender: impl Into<String>, payload: impl Into<Value>) -> Self {
        Self {
            sender: sender.into(),
            payload: payload.into(),
        }
    }
}

/// One event waiting for the scheduler.
///
/// Each variant carries only its own payload. `Empty` marks a recycled
/// record sitting on the free list.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum QueueEntry {
    /// Recycled, carries nothing.
    #[default]
    Empty,
    /// Sequence marker for "wait until processed" callers.
    Mark {
        /// Sequence number.
        sequence: u64,
    },
    /// A named external state changed.
    LookupValueChange {
        /// State name.
        state: String,
        /// New value.
        value: Value,
    },
    /// A command handle arrived.
    CommandAck {
        /// The dispatch acknowledged.
        command: ActionId,
        /// New handle.
        handle: CommandHandle,
    },
    /// A command returned a value.
    CommandReturn {
        /// The dispatch.
        command: ActionId,
        /// Returned value.
        value: Value,
    },
    /// An abort was acknowledged.
    CommandAbortAck {
        /// The aborted dispatch.
        command: ActionId,
        /// Whether the abort succeeded.
        acknowledged: bool,
    },
    /// An update or planner request was acknowledged.
    UpdateAck {
        /// The dispatch.
        update: ActionId,
        /// Acknowledgement value.
        acknowledged: bool,
    },
    /// A plan to insert.
    AddPlan {
        /// The plan.
        plan: Box<NodeSpec>,
        /// List node to graft under; a new root if absent.
        parent: Option<String>,
    },
    /// A library to register.
    AddLibrary {
        /// The library.
        library: Box<NodeSpec>,
    },
    /// A message arrived.
    ReceiveMessage {
        /// The message.
        message: Message,
    },
    /// The message source has nothing more.
    MessageQueueEmpty,
    /// A message was accepted under a handle.
    AcceptMessage {
        /// Handle naming the message.
        handle: String,
        /// The message.
        message: Message,
    },
    /// A message handle is no longer needed.
    ReleaseMessageHandle {
        /// The handle.
        handle: String,
    },
}

impl QueueEntry {
    /// Tag name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Mark { .. } => "Mark",
            Self::LookupValueChange { .. } => "LookupValueChange",
            Self::CommandAck { .. } => "CommandAck",
            Self::CommandReturn { .. } => "CommandReturn",
            Self::CommandAbortAck { .. } => "CommandAbortAck",
            Self::UpdateAck { .. } => "UpdateAck",
            Self::AddPlan { .. } => "AddPlan",
            Self::AddLibrary { .. } => "AddLibrary",
            Self::ReceiveMessage { .. } => "ReceiveMessage",
            Self::MessageQueueEmpty => "MessageQueueEmpty",
            Self::AcceptMessage { .. } => "AcceptMessage",
            Self::ReleaseMessageHandle { .. } => "ReleaseMessageHandle",
        }
    }
}
