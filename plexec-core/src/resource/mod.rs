//! Resource hierarchy and command arbitration.

mod arbiter;
mod hierarchy;
mod request;

pub use arbiter::{Arbitration, PendingCommand, ResourceArbiter};
pub use hierarchy::{ChildResource, DEFAULT_CAPACITY, ResourceHierarchy, ResourceNode};
pub use request::{ResourceRequest, ResourceUsage};
