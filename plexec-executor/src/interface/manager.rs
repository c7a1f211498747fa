//! Queue drain and adapter registry.

use super::sink::EventSink;
use crate::exec::Exec;
use crate::metrics::ExecMetrics;
use dashmap::DashMap;
use parking_lot::RwLock;
use plexec_core::error::{PlexecError, Result};
use plexec_core::interface::{CommandRequest, ExternalInterface, UpdateRequest};
use plexec_core::queue::{InputQueue, QueueEntry};
use plexec_core::sync::Semaphore;
use plexec_core::types::CommandHandle;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, instrument, trace, warn};

/// Performs commands named in a plan.
///
/// Called on the worker thread with the exec lock held: implementations
/// must return promptly and report results through the [`EventSink`].
pub trait CommandHandler: Send + Sync {
    /// Start a command.
    fn execute(&self, command: &CommandRequest, sink: &EventSink);

    /// Abort a running command. The default acknowledges at once.
    fn abort(&self, command: &CommandRequest, sink: &EventSink) {
        sink.abort_ack(command.action, true);
    }
}

/// Receives updates and planner requests.
pub trait UpdateHandler: Send + Sync {
    /// Deliver an update. Acknowledge through the sink.
    fn send_update(&self, update: &UpdateRequest, sink: &EventSink);
}

/// Routes outgoing actions to registered handlers and replays incoming
/// events from the input queue into the executive.
pub struct InterfaceManager {
    queue: Arc<InputQueue>,
    sink: EventSink,
    handlers: DashMap<String, Arc<dyn CommandHandler>>,
    default_handler: RwLock<Option<Arc<dyn CommandHandler>>>,
    update_handler: RwLock<Option<Arc<dyn UpdateHandler>>>,
    next_mark: AtomicU64,
    seen_mark: AtomicU64,
    completed_mark: AtomicU64,
}

impl InterfaceManager {
    /// Create a manager draining `queue`; producers wake the worker
    /// through `wake`.
    pub fn new(queue: Arc<InputQueue>, wake: Arc<Semaphore>) -> Self {
        Self {
            sink: EventSink::new(Arc::clone(&queue), wake),
            queue,
            handlers: DashMap::new(),
            default_handler: RwLock::new(None),
            update_handler: RwLock::new(None),
            next_mark: AtomicU64::new(0),
            seen_mark: AtomicU64::new(0),
            completed_mark: AtomicU64::new(0),
        }
    }

    /// Producer handle for adapters.
    pub fn sink(&self) -> EventSink {
        self.sink.clone()
    }

    /// The input queue.
    pub fn queue(&self) -> &Arc<InputQueue> {
        &self.queue
    }

    /// Register the handler for one command name.
    pub fn register_command_handler(
        &self,
        name: impl Into<String>,
        handler: Arc<dyn CommandHandler>,
    ) -> Result<()> {
        let name = name.into();
        if self.handlers.contains_key(&name) {
            return Err(PlexecError::DuplicateHandler { name });
        }
        debug!(command = %name, "Command handler registered");
        self.handlers.insert(name, handler);
        Ok(())
    }

    /// Remove a command handler. Returns whether one was registered.
    pub fn unregister_command_handler(&self, name: &str) -> bool {
        self.handlers.remove(name).is_some()
    }

    /// Handler for commands with no specific handler.
    pub fn set_default_command_handler(&self, handler: Arc<dyn CommandHandler>) {
        *self.default_handler.write() = Some(handler);
    }

    /// Handler for updates and planner requests.
    pub fn set_update_handler(&self, handler: Arc<dyn UpdateHandler>) {
        *self.update_handler.write() = Some(handler);
    }

    fn handler_for(&self, name: &str) -> Option<Arc<dyn CommandHandler>> {
        self.handlers
            .get(name)
            .map(|h| Arc::clone(h.value()))
            .or_else(|| self.default_handler.read().clone())
    }

    /// Queue a mark and return its sequence number.
    pub fn enqueue_mark(&self) -> u64 {
        let sequence = self.next_mark.fetch_add(1, Ordering::SeqCst) + 1;
        self.sink.mark(sequence);
        sequence
    }

    /// Highest mark whose preceding input has been fully processed.
    pub fn completed_mark(&self) -> u64 {
        self.completed_mark.load(Ordering::SeqCst)
    }

    /// Declare every mark drained so far complete. Call once the step
    /// following the drain is quiescent.
    pub fn complete_marks(&self) -> u64 {
        let seen = self.seen_mark.load(Ordering::SeqCst);
        self.completed_mark.fetch_max(seen, Ordering::SeqCst);
        self.completed_mark()
    }

    /// Apply every queued record to the executive, oldest first.
    ///
    /// Returns whether the executive should step. Plans that fail to insert
    /// are logged and dropped; only fatal errors are returned.
    #[instrument(skip_all, fields(queued = self.queue.len()))]
    pub fn process_queue(&self, exec: &mut Exec) -> Result<bool> {
        let mut processed = 0u64;
        let mut result = Ok(());
        while let Some(entry) = self.queue.get() {
            let applied = self.apply(exec, &entry);
            self.queue.release(entry);
            processed += 1;
            if let Err(e) = applied {
                result = Err(e);
                break;
            }
        }
        ExecMetrics::add(&exec.metrics().queue_entries_processed, processed);
        if processed > 0 {
            debug!(processed, "Input queue drained");
        }
        result?;
        Ok(exec.needs_step())
    }

    fn apply(&self, exec: &mut Exec, entry: &QueueEntry) -> Result<()> {
        trace!(kind = entry.kind(), "Applying queue entry");
        match entry {
            QueueEntry::Empty => {}
            QueueEntry::Mark { sequence } => {
                self.seen_mark.fetch_max(*sequence, Ordering::SeqCst);
            }
            QueueEntry::LookupValueChange { state, value } => {
                exec.handle_lookup(state, value.clone());
            }
            QueueEntry::CommandAck { command, handle } => {
                exec.handle_command_ack(*command, *handle);
            }
            QueueEntry::CommandReturn { command, value } => {
                exec.handle_command_return(*command, value.clone());
            }
            QueueEntry::CommandAbortAck {
                command,
                acknowledged,
            } => {
                exec.handle_abort_ack(*command, *acknowledged);
            }
            QueueEntry::UpdateAck {
                update,
                acknowledged,
            } => {
                exec.handle_update_ack(*update, *acknowledged);
            }
            QueueEntry::AddPlan { plan, parent } => {
                if let Err(e) = exec.add_plan(plan, parent.as_deref()) {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(plan = %plan.name, error = %e, "Plan rejected");
                }
            }
            QueueEntry::AddLibrary { library } => {
                if let Err(e) = exec.add_library(library.as_ref().clone()) {
                    if e.is_fatal() {
                        return Err(e);
                    }
                    warn!(library = %library.name, error = %e, "Library rejected");
                }
            }
            QueueEntry::ReceiveMessage { message } => {
                exec.cache_mut().receive_message(message.clone());
                exec.request_step();
            }
            QueueEntry::MessageQueueEmpty => {
                exec.cache_mut().set_messages_exhausted();
                exec.request_step();
            }
            QueueEntry::AcceptMessage { handle, message } => {
                exec.cache_mut().accept_message(handle.clone(), message.clone());
                exec.request_step();
            }
            QueueEntry::ReleaseMessageHandle { handle } => {
                if !exec.cache_mut().release_message_handle(handle) {
                    debug!(handle = %handle, "Unknown message handle released");
                }
            }
        }
        Ok(())
    }
}

impl ExternalInterface for InterfaceManager {
    fn execute_command(&self, command: &CommandRequest) {
        match self.handler_for(&command.name) {
            Some(handler) => handler.execute(command, &self.sink),
            None => {
                warn!(command = %command.name, node = %command.node_name, "No handler for command");
                self.sink.command_ack(command.action, CommandHandle::Failed);
            }
        }
    }

    fn abort_command(&self, command: &CommandRequest) {
        match self.handler_for(&command.name) {
            Some(handler) => handler.abort(command, &self.sink),
            None => self.sink.abort_ack(command.action, true),
        }
    }

    fn send_update(&self, update: &UpdateRequest) {
        let handler = self.update_handler.read().clone();
        match handler {
            Some(handler) => handler.send_update(update, &self.sink),
            None => self.sink.update_ack(update.action, true),
        }
    }
}

impl std::fmt::Debug for InterfaceManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterfaceManager")
            .field("queue", &self.queue)
            .field("handlers", &self.handlers.len())
            .field("completed_mark", &self.completed_mark())
            .finish_non_exhaustive()
    }
}
