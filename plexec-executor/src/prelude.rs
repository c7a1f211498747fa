//! Prelude for convenient imports.
//!
//! Re-exports the `plexec-core` prelude alongside the executor types.

pub use plexec_core::prelude::*;

pub use crate::app::{ApplicationState, ApplicationStatus, ExecApplication};
pub use crate::config::{ApplicationConfig, ExecConfig};
pub use crate::exec::{Exec, StateCache};
pub use crate::interface::{CommandHandler, EventSink, InterfaceManager, UpdateHandler};
pub use crate::listener::{ListenerHub, ListenerId};
pub use crate::metrics::{ExecMetrics, MetricsSnapshot};
