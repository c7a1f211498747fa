//! Common test utilities for integration tests.

#![allow(dead_code)]

use parking_lot::Mutex;
use plexec_core::error::Result;
use plexec_core::interface::CommandRequest;
use plexec_core::listener::{ExecListener, NodeTransition};
use plexec_core::node::{Expr, NodeSpec};
use plexec_core::queue::InputQueue;
use plexec_core::resource::ResourceRequest;
use plexec_core::sync::Semaphore;
use plexec_core::types::{ActionId, CommandHandle, NodeState};
use plexec_executor::config::{ApplicationConfig, ExecConfig};
use plexec_executor::exec::Exec;
use plexec_executor::interface::{CommandHandler, EventSink, InterfaceManager};
use plexec_executor::ExecApplication;
use std::sync::Arc;
use std::time::Duration;

/// How long blocking waits in tests may take before failing.
pub const WAIT: Duration = Duration::from_secs(5);

/// A command that stays EXECUTING until it reports success.
pub fn drive(name: &str) -> NodeSpec {
    NodeSpec::command(name, "drive").end(Expr::CommandHandle(CommandHandle::Success))
}

/// [`drive`] holding one unit of `resource`.
pub fn drive_with(name: &str, resource: &str) -> NodeSpec {
    drive(name).with_resource(ResourceRequest::new(resource))
}

/// What a [`RecordingHandler`] does with each command it receives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    /// Record only. Complete later with [`RecordingHandler::complete_all`].
    Hold,
    /// Report this handle at once.
    Immediate(CommandHandle),
}

/// Records every command and abort it is asked to perform.
pub struct RecordingHandler {
    reply: Reply,
    pub commands: Mutex<Vec<CommandRequest>>,
    pub aborts: Mutex<Vec<CommandRequest>>,
}

impl RecordingHandler {
    pub fn new(reply: Reply) -> Arc<Self> {
        Arc::new(Self {
            reply,
            commands: Mutex::new(Vec::new()),
            aborts: Mutex::new(Vec::new()),
        })
    }

    pub fn sent(&self) -> Vec<ActionId> {
        self.commands.lock().iter().map(|c| c.action).collect()
    }

    pub fn count(&self) -> usize {
        self.commands.lock().len()
    }

    /// Report success for every command received so far.
    pub fn complete_all(&self, sink: &EventSink) {
        for action in self.sent() {
            sink.command_ack(action, CommandHandle::Success);
        }
    }
}

impl CommandHandler for RecordingHandler {
    fn execute(&self, command: &CommandRequest, sink: &EventSink) {
        self.commands.lock().push(command.clone());
        if let Reply::Immediate(handle) = self.reply {
            sink.command_ack(command.action, handle);
        }
    }

    fn abort(&self, command: &CommandRequest, sink: &EventSink) {
        self.aborts.lock().push(command.clone());
        sink.abort_ack(command.action, true);
    }
}

/// Records every transition, in notification order.
#[derive(Default)]
pub struct RecordingListener {
    pub transitions: Mutex<Vec<NodeTransition>>,
    pub plans: Mutex<Vec<String>>,
    pub steps: Mutex<Vec<u64>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// States a node passed through, starting from its first transition.
    pub fn path(&self, name: &str) -> Vec<NodeState> {
        self.transitions
            .lock()
            .iter()
            .filter(|t| t.name == name)
            .map(|t| t.to)
            .collect()
    }
}

impl ExecListener for RecordingListener {
    fn on_transitions(&self, transitions: &[NodeTransition]) {
        self.transitions.lock().extend_from_slice(transitions);
    }

    fn on_plan_added(&self, root: &str, _parent: Option<&str>) {
        self.plans.lock().push(root.to_string());
    }

    fn on_step_complete(&self, step: u64) {
        self.steps.lock().push(step);
    }
}

/// An executive wired to an interface manager, driven by hand.
pub struct Harness {
    pub exec: Exec,
    pub manager: Arc<InterfaceManager>,
    pub wake: Arc<Semaphore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_config(ExecConfig::default())
    }

    pub fn with_config(config: ExecConfig) -> Self {
        let queue = Arc::new(InputQueue::with_capacity(8));
        let wake = Arc::new(Semaphore::new());
        let manager = Arc::new(InterfaceManager::new(queue, Arc::clone(&wake)));
        let exec = Exec::new(config, manager.clone()).unwrap();
        Self {
            exec,
            manager,
            wake,
        }
    }

    pub fn sink(&self) -> EventSink {
        self.manager.sink()
    }

    /// Drain and step until nothing is queued and nothing needs a step.
    pub fn settle(&mut self) {
        assert!(self.try_settle().unwrap(), "harness did not settle");
    }

    /// [`Harness::settle`] reporting step errors. `Ok(false)` when the
    /// executive still wanted steps after the iteration bound.
    pub fn try_settle(&mut self) -> Result<bool> {
        for _ in 0..100 {
            if self.manager.process_queue(&mut self.exec)? {
                self.exec.step()?;
            }
            if !self.exec.needs_step() && self.manager.queue().is_empty() {
                self.manager.complete_marks();
                return Ok(true);
            }
        }
        Ok(false)
    }

    pub fn state(&self, name: &str) -> Option<NodeState> {
        self.exec.node_state(name)
    }
}

/// Application config with short timeouts.
pub fn test_app_config() -> ApplicationConfig {
    ApplicationConfig::default()
        .with_stop_timeout_ms(2_000)
        .with_plan_poll_interval_ms(10)
}

/// An application initialized and ready for input.
pub fn ready_app() -> ExecApplication {
    let app = ExecApplication::new(test_app_config()).unwrap();
    app.initialize().unwrap();
    app.start_interfaces().unwrap();
    app
}

/// An application with its worker running.
pub fn running_app() -> ExecApplication {
    let app = ready_app();
    app.run().unwrap();
    app
}
