//! Process-wide `tracing` subscriber setup.
//!
//! The executive logs through `tracing` everywhere; embedding programs
//! call [`init_tracing`] once at start-up. Format and filter come from
//! `PLEXEC_LOG_FORMAT` (`json`, `pretty` or `compact`) and
//! `PLEXEC_LOG_LEVEL`, falling back to `RUST_LOG`.
//!
//! ```ignore
//! use plexec_executor::observability::{TracingConfig, init_tracing};
//!
//! init_tracing(TracingConfig::from_env())?;
//! ```

mod config;
mod tracing_setup;

pub use config::{LogFormat, TracingConfig};
pub use tracing_setup::init_tracing;
