//! Fan-out of scheduler notifications.

use parking_lot::RwLock;
use plexec_core::error::{PlexecError, Result};
use plexec_core::listener::{ExecListener, NodeTransition};
use plexec_core::logging::{LogCategory, LogCollector, LogEvent};
use plexec_core::types::RunId;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Handle for removing a listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    fn next() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw value.
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "listener_{}", self.0)
    }
}

/// Registered listeners, notified in registration order.
#[derive(Default)]
pub struct ListenerHub {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn ExecListener>)>>,
}

impl ListenerHub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener.
    pub fn add(&self, listener: Arc<dyn ExecListener>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.write().push((id, listener));
        tracing::debug!(listener_id = %id, "Listener added");
        id
    }

    /// Remove a listener.
    pub fn remove(&self, id: ListenerId) -> Result<()> {
        let mut listeners = self.listeners.write();
        match listeners.iter().position(|(lid, _)| *lid == id) {
            Some(pos) => {
                listeners.remove(pos);
                tracing::debug!(listener_id = %id, "Listener removed");
                Ok(())
            }
            None => Err(PlexecError::ConfigValue {
                field: format!("listener:{id}"),
                cause: "Listener not found".to_string(),
            }),
        }
    }

    /// Number of listeners.
    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Check if no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<dyn ExecListener>> {
        self.listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect()
    }

    pub(crate) fn notify_transitions(&self, transitions: &[NodeTransition]) {
        if transitions.is_empty() {
            return;
        }
        for listener in self.snapshot() {
            listener.on_transitions(transitions);
        }
    }

    pub(crate) fn notify_plan_added(&self, root: &str, parent: Option<&str>) {
        for listener in self.snapshot() {
            listener.on_plan_added(root, parent);
        }
    }

    pub(crate) fn notify_library_added(&self, name: &str) {
        for listener in self.snapshot() {
            listener.on_library_added(name);
        }
    }

    pub(crate) fn notify_step_complete(&self, step: u64) {
        for listener in self.snapshot() {
            listener.on_step_complete(step);
        }
    }
}

impl std::fmt::Debug for ListenerHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHub")
            .field("listeners", &self.len())
            .finish()
    }
}

/// Forwards notifications to a [`LogCollector`].
pub struct LoggingListener {
    collector: Arc<dyn LogCollector>,
    run_id: RunId,
}

impl LoggingListener {
    /// Create a listener tagging events with `run_id`.
    pub fn new(collector: Arc<dyn LogCollector>, run_id: RunId) -> Self {
        Self { collector, run_id }
    }
}

impl ExecListener for LoggingListener {
    fn on_transitions(&self, transitions: &[NodeTransition]) {
        for t in transitions {
            let mut event = LogEvent::transition(t.node, t.name.clone(), t.from, t.to)
                .with_run_id(self.run_id)
                .with_field_u64("step", t.step);
            if let Some(outcome) = t.outcome {
                event = event.with_field("outcome", outcome.as_str());
            }
            if let Some(failure) = t.failure_type {
                event = event.with_field("failure_type", failure.as_str());
            }
            self.collector.collect(event);
        }
    }

    fn on_plan_added(&self, root: &str, parent: Option<&str>) {
        let mut event = LogEvent::info(LogCategory::Plan, format!("Plan '{root}' added"))
            .with_run_id(self.run_id);
        if let Some(parent) = parent {
            event = event.with_field("parent", parent);
        }
        self.collector.collect(event);
    }

    fn on_library_added(&self, name: &str) {
        self.collector.collect(
            LogEvent::info(LogCategory::Plan, format!("Library '{name}' added"))
                .with_run_id(self.run_id),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use plexec_core::logging::BufferedCollector;
    use plexec_core::node::NodeType;
    use plexec_core::types::{NodeId, NodeState, Outcome};

    #[derive(Default)]
    struct Counting {
        steps: Mutex<Vec<u64>>,
    }

    impl ExecListener for Counting {
        fn on_step_complete(&self, step: u64) {
            self.steps.lock().push(step);
        }
    }

    fn transition() -> NodeTransition {
        NodeTransition {
            node: NodeId::new(0),
            name: "Root".to_string(),
            node_type: NodeType::Empty,
            from: NodeState::IterationEnded,
            to: NodeState::Finished,
            outcome: Some(Outcome::Success),
            failure_type: None,
            step: 1,
        }
    }

    #[test]
    fn add_and_remove() {
        let hub = ListenerHub::new();
        let counting = Arc::new(Counting::default());
        let id = hub.add(counting.clone());
        hub.notify_step_complete(1);
        hub.remove(id).unwrap();
        hub.notify_step_complete(2);
        assert_eq!(*counting.steps.lock(), vec![1]);
        assert!(hub.is_empty());
        assert!(hub.remove(id).is_err());
    }

    #[test]
    fn logging_listener_records_transitions() {
        let collector = Arc::new(BufferedCollector::default());
        let run = RunId::new();
        let hub = ListenerHub::new();
        hub.add(Arc::new(LoggingListener::new(collector.clone(), run)));

        hub.notify_transitions(&[transition()]);
        hub.notify_plan_added("Root", None);

        let events = collector.by_run(run);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].category, LogCategory::Transition);
        assert_eq!(events[0].fields["outcome"], "SUCCESS");
        assert_eq!(events[1].category, LogCategory::Plan);
    }
}
