//! The scheduler and the external state it reads.

mod cache;
mod scheduler;

pub use cache::StateCache;
pub use scheduler::Exec;
