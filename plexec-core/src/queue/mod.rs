//! The input queue between external producers and the scheduler.

mod entry;
mod input;

pub use entry::{Message, QueueEntry};
pub use input::{InputQueue, PooledEntry, QueueStats};
