//! Prelude for convenient imports.
//!
//! ```ignore
//! use plexec_core::prelude::*;
//! ```

// Core types
pub use crate::types::{ActionId, CommandHandle, FailureType, NodeId, NodeState, Outcome, RunId};
pub use crate::value::Value;

// Error handling
pub use crate::error::{PlexecError, Result};

// Plans
pub use crate::node::{ConditionKind, Expr, ExprContext, Node, NodeSpec, NodeType, PlanTree};

// State machine
pub use crate::state::{Effects, StateTableRegistry};

// Resources
pub use crate::resource::{ResourceArbiter, ResourceHierarchy, ResourceRequest};

// Queue and interfaces
pub use crate::interface::{CommandRequest, ExternalInterface, UpdateKind, UpdateRequest};
pub use crate::listener::{ExecListener, NodeTransition};
pub use crate::queue::{InputQueue, Message, QueueEntry};

// Logging
pub use crate::logging::{BufferedCollector, LogCategory, LogCollector, LogEvent, LogLevel};
