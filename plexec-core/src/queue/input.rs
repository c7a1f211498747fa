//! FIFO of input events with record recycling.

use super::entry::QueueEntry;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

/// A pooled record. Boxed so it moves between the queue and the free list
/// without copying its payload.
pub type PooledEntry = Box<QueueEntry>;

#[derive(Default)]
struct Lists {
    queue: VecDeque<PooledEntry>,
    free: Vec<PooledEntry>,
}

/// Allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    /// `allocate` calls.
    pub allocated: u64,
    /// Allocations that had to create a new record.
    pub fresh: u64,
    /// `release` calls.
    pub released: u64,
    /// Records queued.
    pub queued: usize,
    /// Records on the free list.
    pub free: usize,
}

/// Multi-producer, single-consumer queue of input events.
///
/// Producers `allocate` a record, fill it and `put` it. The consumer `get`s
/// records in FIFO order and `release`s them back to the free list once
/// applied. A record is on at most one list at a time: ownership moves
/// with the box.
#[derive(Default)]
pub struct InputQueue {
    lists: Mutex<Lists>,
    allocated: AtomicU64,
    fresh: AtomicU64,
    released: AtomicU64,
}

impl InputQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a queue with records already on the free list.
    pub fn with_capacity(prealloc: usize) -> Self {
        let queue = Self::new();
        {
            let mut lists = queue.lists.lock();
            lists.free.reserve(prealloc);
            for _ in 0..prealloc {
                lists.free.push(Box::default());
            }
            lists.queue.reserve(prealloc);
        }
        queue
    }

    /// Take a record from the free list, or create one.
    pub fn allocate(&self) -> PooledEntry {
        self.allocated.fetch_add(1, Ordering::Relaxed);
        if let Some(entry) = self.lists.lock().free.pop() {
            return entry;
        }
        self.fresh.fetch_add(1, Ordering::Relaxed);
        Box::default()
    }

    /// Append a record.
    pub fn put(&self, entry: PooledEntry) {
        self.lists.lock().queue.push_back(entry);
    }

    /// Allocate, fill and append in one call.
    pub fn push(&self, value: QueueEntry) {
        let mut entry = self.allocate();
        *entry = value;
        self.put(entry);
    }

    /// Pop the oldest record.
    pub fn get(&self) -> Option<PooledEntry> {
        self.lists.lock().queue.pop_front()
    }

    /// Clear a record and return it to the free list.
    pub fn release(&self, mut entry: PooledEntry) {
        *entry = QueueEntry::Empty;
        self.released.fetch_add(1, Ordering::Relaxed);
        self.lists.lock().free.push(entry);
    }

    /// Check if nothing is queued.
    pub fn is_empty(&self) -> bool {
        self.lists.lock().queue.is_empty()
    }

    /// Number of queued records.
    pub fn len(&self) -> usize {
        self.lists.lock().queue.len()
    }

    /// Release every queued record without applying it.
    pub fn flush(&self) -> usize {
        let mut lists = self.lists.lock();
        let drained: Vec<PooledEntry> = lists.queue.drain(..).collect();
        let count = drained.len();
        for mut entry in drained {
            *entry = QueueEntry::Empty;
            lists.free.push(entry);
        }
        self.released.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Records allocated and not yet released.
    pub fn outstanding(&self) -> u64 {
        self.allocated
            .load(Ordering::Relaxed)
            .saturating_sub(self.released.load(Ordering::Relaxed))
    }

    /// Allocation counters.
    pub fn stats(&self) -> QueueStats {
        let lists = self.lists.lock();
        QueueStats {
            allocated: self.allocated.load(Ordering::Relaxed),
            fresh: self.fresh.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
            queued: lists.queue.len(),
            free: lists.free.len(),
        }
    }
}

impl std::fmt::Debug for InputQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InputQueue")
            .field("stats", &self.stats())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;
    use std::sync::Arc;
    use std::thread;

    fn change(state: &str) -> QueueEntry {
        QueueEntry::LookupValueChange {
            state: state.to_string(),
            value: Value::bool(true),
        }
    }

    #[test]
    fn fifo_order() {
        let queue = InputQueue::new();
        for name in ["A", "B", "C"] {
            queue.push(change(name));
        }
        let mut seen = Vec::new();
        while let Some(entry) = queue.get() {
            if let QueueEntry::LookupValueChange { state, .. } = &*entry {
                seen.push(state.clone());
            }
            queue.release(entry);
        }
        assert_eq!(seen, vec!["A", "B", "C"]);
        assert_eq!(queue.outstanding(), 0);
    }

    #[test]
    fn records_are_recycled() {
        let queue = InputQueue::new();
        queue.push(change("A"));
        let entry = queue.get().unwrap();
        queue.release(entry);

        queue.push(change("B"));
        let stats = queue.stats();
        assert_eq!(stats.allocated, 2);
        assert_eq!(stats.fresh, 1);
        assert_eq!(stats.free, 0);

        let entry = queue.get().unwrap();
        queue.release(entry);
        assert_eq!(queue.stats().free, 1);
    }

    #[test]
    fn released_records_are_cleared() {
        let queue = InputQueue::with_capacity(1);
        queue.push(change("A"));
        let entry = queue.get().unwrap();
        queue.release(entry);
        assert_eq!(*queue.allocate(), QueueEntry::Empty);
    }

    #[test]
    fn preallocated_records_avoid_fresh_allocation() {
        let queue = InputQueue::with_capacity(4);
        for i in 0..4 {
            queue.push(QueueEntry::Mark { sequence: i });
        }
        assert_eq!(queue.stats().fresh, 0);
        assert_eq!(queue.flush(), 4);
        assert_eq!(queue.outstanding(), 0);
        assert_eq!(queue.stats().free, 4);
    }

    #[test]
    fn concurrent_producers_balance() {
        let queue = Arc::new(InputQueue::new());
        let producers: Vec<_> = (0..4)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..100 {
                        queue.push(QueueEntry::Mark {
                            sequence: p * 1000 + i,
                        });
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let mut last_per_producer = [None::<u64>; 4];
        let mut count = 0;
        while let Some(entry) = queue.get() {
            if let QueueEntry::Mark { sequence } = *entry {
                let p = (sequence / 1000) as usize;
                assert!(last_per_producer[p].is_none_or(|last| last < sequence));
                last_per_producer[p] = Some(sequence);
                count += 1;
            }
            queue.release(entry);
        }
        assert_eq!(count, 400);
        assert_eq!(queue.outstanding(), 0);
    }
}
