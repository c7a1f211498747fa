//! Structured execution logging.
//!
//! `tracing` carries operational logs. This module keeps a queryable record
//! of what the executive did, correlated by run and node:
//!
//! ```text
//! LogEvent (run_id, node) ──> LogCollector ──> subscribers
//!                                  │
//!                                  └──> LogFilter queries
//! ```

mod collector;
mod event;
mod filter;

pub use collector::{BufferedCollector, DEFAULT_BUFFER_CAPACITY, LogCollector, NullCollector};
pub use event::{LogCategory, LogEvent, LogLevel};
pub use filter::LogFilter;
