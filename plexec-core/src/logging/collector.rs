//! Sinks for structured log events.

use super::event::{LogEvent, LogLevel};
use super::filter::LogFilter;
use crate::types::{NodeId, RunId};
use parking_lot::RwLock;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default ring buffer size.
pub const DEFAULT_BUFFER_CAPACITY: usize = 10_000;

/// Receives log events.
pub trait LogCollector: Send + Sync {
    /// Take one event.
    fn collect(&self, event: LogEvent);

    /// Number of events held.
    fn len(&self) -> usize;

    /// Check if no events are held.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

type Subscriber = Arc<dyn Fn(&LogEvent) + Send + Sync>;

/// Bounded in-memory collector.
///
/// Oldest events are dropped once `capacity` is reached. Subscribers see
/// every accepted event synchronously, before it is buffered.
pub struct BufferedCollector {
    buffer: RwLock<VecDeque<LogEvent>>,
    capacity: usize,
    next_id: AtomicU64,
    min_level: LogLevel,
    subscribers: RwLock<Vec<Subscriber>>,
}

impl BufferedCollector {
    /// Create a collector holding at most `capacity` events.
    pub fn new(capacity: usize) -> Self {
        Self {
            buffer: RwLock::new(VecDeque::with_capacity(capacity.min(1024))),
            capacity: capacity.max(1),
            next_id: AtomicU64::new(1),
            min_level: LogLevel::Trace,
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Drop events below `level` on arrival.
    pub fn with_min_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    /// Register a callback for every accepted event.
    pub fn subscribe(&self, callback: Subscriber) {
        self.subscribers.write().push(callback);
    }

    /// Events matching a filter, oldest first, capped by its limit.
    pub fn query(&self, filter: &LogFilter) -> Vec<LogEvent> {
        self.buffer
            .read()
            .iter()
            .filter(|e| filter.matches(e))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Events of one run.
    pub fn by_run(&self, run_id: RunId) -> Vec<LogEvent> {
        self.query(&LogFilter::new().run_id(run_id))
    }

    /// Events of one node.
    pub fn by_node(&self, node_id: NodeId) -> Vec<LogEvent> {
        self.query(&LogFilter::new().node_id(node_id))
    }

    /// Events at `min_level` and above.
    pub fn by_level(&self, min_level: LogLevel) -> Vec<LogEvent> {
        self.query(&LogFilter::new().min_level(min_level))
    }

    /// The newest `limit` events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<LogEvent> {
        self.buffer.read().iter().rev().take(limit).cloned().collect()
    }

    /// Everything held.
    pub fn all(&self) -> Vec<LogEvent> {
        self.buffer.read().iter().cloned().collect()
    }

    /// Drop everything held.
    pub fn clear(&self) {
        self.buffer.write().clear();
    }

    /// Maximum number of events held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl LogCollector for BufferedCollector {
    fn collect(&self, mut event: LogEvent) {
        if event.level < self.min_level {
            return;
        }
        event.id = self.next_id.fetch_add(1, Ordering::SeqCst);

        for subscriber in self.subscribers.read().iter() {
            subscriber(&event);
        }

        let mut buffer = self.buffer.write();
        if buffer.len() >= self.capacity {
            buffer.pop_front();
        }
        buffer.push_back(event);
    }

    fn len(&self) -> usize {
        self.buffer.read().len()
    }
}

impl Default for BufferedCollector {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_CAPACITY)
    }
}

impl std::fmt::Debug for BufferedCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BufferedCollector")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .field("min_level", &self.min_level)
            .finish()
    }
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCollector;

impl LogCollector for NullCollector {
    fn collect(&self, _event: LogEvent) {}

    fn len(&self) -> usize {
        0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogCategory;
    use parking_lot::Mutex;

    #[test]
    fn ring_buffer_drops_oldest() {
        let collector = BufferedCollector::new(3);
        for i in 1..=4 {
            collector.collect(LogEvent::info(LogCategory::System, format!("event {i}")));
        }
        assert_eq!(collector.len(), 3);
        let events = collector.all();
        assert_eq!(events[0].message, "event 2");
        assert_eq!(events[2].message, "event 4");
        assert_eq!(events[2].id, 4);
    }

    #[test]
    fn min_level_drops_on_arrival() {
        let collector = BufferedCollector::new(10).with_min_level(LogLevel::Info);
        collector.collect(LogEvent::debug(LogCategory::Transition, "quiet"));
        collector.collect(LogEvent::warn(LogCategory::Resource, "loud"));
        assert_eq!(collector.len(), 1);
        assert_eq!(collector.by_level(LogLevel::Warn).len(), 1);
    }

    #[test]
    fn subscribers_see_assigned_ids() {
        let collector = BufferedCollector::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        collector.subscribe(Arc::new(move |event: &LogEvent| sink.lock().push(event.id)));
        collector.collect(LogEvent::info(LogCategory::Plan, "a"));
        collector.collect(LogEvent::info(LogCategory::Plan, "b"));
        assert_eq!(*seen.lock(), vec![1, 2]);
    }

    #[test]
    fn correlation_queries() {
        let collector = BufferedCollector::default();
        let run = RunId::new();
        collector.collect(
            LogEvent::info(LogCategory::Command, "sent")
                .with_run_id(run)
                .with_node(NodeId::new(1), "Drive"),
        );
        collector.collect(LogEvent::info(LogCategory::Command, "sent").with_run_id(RunId::new()));
        assert_eq!(collector.by_run(run).len(), 1);
        assert_eq!(collector.by_node(NodeId::new(1)).len(), 1);
        assert_eq!(collector.recent(1)[0].run_id.map(|r| r == run), Some(false));
        assert_eq!(collector.query(&LogFilter::new().limit(1)).len(), 1);
        collector.clear();
        assert!(collector.is_empty());
    }

    #[test]
    fn null_collector_holds_nothing() {
        let collector = NullCollector;
        collector.collect(LogEvent::error(LogCategory::System, "gone"));
        assert!(collector.is_empty());
    }
}
