//! plexec executor
//!
//! Runs plans built from `plexec-core` types.
//!
//! # Key Components
//!
//! - **Exec**: steps the node state machines to quiescence, arbitrates
//!   commands and dispatches them
//! - **InterfaceManager**: drains the input queue into the executive and
//!   routes outgoing commands and updates to registered handlers
//! - **ExecApplication**: owns the executive and its worker thread, and
//!   exposes start, stop and wait operations
//!
//! # Example
//!
//! ```ignore
//! use plexec_executor::prelude::*;
//!
//! let app = ExecApplication::new(ApplicationConfig::from_env())?;
//! app.manager().register_command_handler("drive", Arc::new(DriveHandler))?;
//! app.initialize()?;
//! app.start_interfaces()?;
//! app.run()?;
//! app.add_plan(NodeSpec::command("Drive", "drive"), None);
//! app.wait_for_plan_finished()?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod app;
pub mod config;
pub mod exec;
pub mod interface;
pub mod listener;
pub mod metrics;
pub mod observability;
pub mod prelude;

pub use app::{ApplicationState, ApplicationStatus, ExecApplication};
pub use config::{ApplicationConfig, ExecConfig};
pub use exec::Exec;
pub use interface::{CommandHandler, EventSink, InterfaceManager, UpdateHandler};
