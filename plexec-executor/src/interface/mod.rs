//! The adapter layer boundary.
//!
//! Adapters report events through an [`EventSink`], which only appends to
//! the input queue. The worker drains the queue with
//! [`InterfaceManager::process_queue`] before each step, and the scheduler
//! hands outgoing commands back to the manager, which routes them to the
//! registered [`CommandHandler`]s.

mod manager;
mod sink;

pub use manager::{CommandHandler, InterfaceManager, UpdateHandler};
pub use sink::EventSink;
