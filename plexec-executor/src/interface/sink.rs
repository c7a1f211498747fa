//! Producer side of the input queue.

use plexec_core::node::NodeSpec;
use plexec_core::queue::{InputQueue, Message, QueueEntry};
use plexec_core::sync::Semaphore;
use plexec_core::types::{ActionId, CommandHandle};
use plexec_core::value::Value;
use std::sync::Arc;

/// Cheap handle adapters use to report external events.
///
/// Every call appends one record and wakes the worker. Nothing here touches
/// node state or takes the exec lock, so any thread may call it at any
/// time, including from inside a command handler.
#[derive(Debug, Clone)]
pub struct EventSink {
    queue: Arc<InputQueue>,
    wake: Arc<Semaphore>,
}

impl EventSink {
    /// Create a sink over a queue and the worker's wake-up semaphore.
    pub fn new(queue: Arc<InputQueue>, wake: Arc<Semaphore>) -> Self {
        Self { queue, wake }
    }

    fn send(&self, entry: QueueEntry) {
        self.queue.push(entry);
        self.wake.post();
    }

    /// A named external state changed.
    pub fn lookup_changed(&self, state: impl Into<String>, value: impl Into<Value>) {
        self.send(QueueEntry::LookupValueChange {
            state: state.into(),
            value: value.into(),
        });
    }

    /// A command's handle changed.
    pub fn command_ack(&self, command: ActionId, handle: CommandHandle) {
        self.send(QueueEntry::CommandAck { command, handle });
    }

    /// A command returned a value.
    pub fn command_return(&self, command: ActionId, value: impl Into<Value>) {
        self.send(QueueEntry::CommandReturn {
            command,
            value: value.into(),
        });
    }

    /// A command abort completed.
    pub fn abort_ack(&self, command: ActionId, acknowledged: bool) {
        self.send(QueueEntry::CommandAbortAck {
            command,
            acknowledged,
        });
    }

    /// An update or planner request was acknowledged.
    pub fn update_ack(&self, update: ActionId, acknowledged: bool) {
        self.send(QueueEntry::UpdateAck {
            update,
            acknowledged,
        });
    }

    /// A message arrived.
    pub fn receive_message(&self, message: Message) {
        self.send(QueueEntry::ReceiveMessage { message });
    }

    /// The message source has nothing more.
    pub fn message_queue_empty(&self) {
        self.send(QueueEntry::MessageQueueEmpty);
    }

    /// A message was accepted under a handle.
    pub fn accept_message(&self, handle: impl Into<String>, message: Message) {
        self.send(QueueEntry::AcceptMessage {
            handle: handle.into(),
            message,
        });
    }

    /// A message handle is no longer needed.
    pub fn release_message_handle(&self, handle: impl Into<String>) {
        self.send(QueueEntry::ReleaseMessageHandle {
            handle: handle.into(),
        });
    }

    /// Insert a plan at the next queue drain.
    pub fn add_plan(&self, plan: NodeSpec, parent: Option<String>) {
        self.send(QueueEntry::AddPlan {
            plan: Box::new(plan),
            parent,
        });
    }

    /// Register a library at the next queue drain.
    pub fn add_library(&self, library: NodeSpec) {
        self.send(QueueEntry::AddLibrary {
            library: Box::new(library),
        });
    }

    pub(crate) fn mark(&self, sequence: u64) {
        self.send(QueueEntry::Mark { sequence });
    }

    /// Wake the worker without queueing anything.
    pub fn notify(&self) {
        self.wake.post();
    }
}
