//! Application lifecycle states.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of an [`ExecApplication`](super::ExecApplication).
///
/// ```text
/// Uninited -> Inited -> Ready <-> Running -> Stopped -> Inited | Shutdown
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationState {
    /// Constructed, nothing loaded.
    Uninited,
    /// Resources loaded, interfaces not started.
    Inited,
    /// Interfaces started; steps run only on request.
    Ready,
    /// The worker thread is processing input.
    Running,
    /// The worker has been stopped.
    Stopped,
    /// Terminal.
    Shutdown,
}

impl ApplicationState {
    /// Check if moving to `next` is allowed.
    pub fn can_transition_to(self, next: ApplicationState) -> bool {
        use ApplicationState::*;
        matches!(
            (self, next),
            (Uninited, Inited)
                | (Inited, Ready)
                | (Inited, Shutdown)
                | (Ready, Running)
                | (Running, Ready)
                | (Ready, Stopped)
                | (Running, Stopped)
                | (Stopped, Inited)
                | (Stopped, Shutdown)
        )
    }

    /// Lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninited => "uninited",
            Self::Inited => "inited",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Shutdown => "shutdown",
        }
    }
}

impl fmt::Display for ApplicationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What waiting callers watch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApplicationStatus {
    /// Lifecycle state.
    pub state: ApplicationState,
    /// Every root plan has FINISHED.
    pub plans_finished: bool,
    /// Steps run by the executive.
    pub steps: u64,
    /// Highest mark fully processed.
    pub completed_mark: u64,
    /// A worker thread is alive.
    pub worker_alive: bool,
    /// Why the worker halted, if it did.
    pub halted: Option<String>,
}

impl Default for ApplicationStatus {
    fn default() -> Self {
        Self {
            state: ApplicationState::Uninited,
            plans_finished: false,
            steps: 0,
            completed_mark: 0,
            worker_alive: false,
            halted: None,
        }
    }
}
