//! plexec core library
//!
//! Leaf types and algorithms of the plexec plan executive. Nothing in this
//! crate spawns threads; the scheduler loop and the application shell live
//! in `plexec-executor`.
//!
//! # Key Components
//!
//! - **Node**: plan nodes held in an arena ([`PlanTree`]) and addressed by
//!   [`NodeId`]
//! - **State**: per-type life-cycle tables driving the eight node states
//! - **Resource**: the resource hierarchy and the command arbiter
//! - **Queue**: the pooled input queue feeding the scheduler
//! - **Logging**: a structured, queryable record of execution
//!
//! # Example
//!
//! ```ignore
//! use plexec_core::prelude::*;
//!
//! let mut tree = PlanTree::new();
//! let ids = tree.insert_plan(&NodeSpec::command("Drive", "drive"), None)?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod interface;
pub mod listener;
pub mod logging;
pub mod node;
pub mod prelude;
pub mod queue;
pub mod resource;
pub mod state;
pub mod sync;
pub mod types;
pub mod value;

pub use error::{PlexecError, Result};
pub use node::{NodeSpec, PlanTree};
pub use types::{ActionId, CommandHandle, FailureType, NodeId, NodeState, Outcome, RunId};
pub use value::Value;
