//! Integration tests for the input queue feeding the executive.

mod common;

use common::Harness;
use plexec_core::queue::{InputQueue, QueueEntry};
use plexec_core::sync::Semaphore;
use plexec_core::value::Value;
use plexec_executor::interface::EventSink;
use std::sync::Arc;
use std::thread;

#[test]
fn entries_applied_in_arrival_order() {
    let mut h = Harness::new();
    for value in 1..=3i64 {
        h.sink().lookup_changed("x", value);
    }
    h.settle();
    assert_eq!(h.exec.cache().lookup_value("x"), Value::int(3));
}

#[test]
fn drained_records_return_to_free_list() {
    let mut h = Harness::new();
    for i in 0..5i64 {
        h.sink().lookup_changed(format!("s{i}"), i);
    }
    h.settle();

    let stats = h.manager.queue().stats();
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.fresh, 0);
    assert_eq!(stats.free, 8);
    assert_eq!(h.manager.queue().outstanding(), 0);
    assert_eq!(h.exec.metrics().snapshot().queue_entries_processed, 5);
}

#[test]
fn pool_grows_under_burst() {
    let queue = InputQueue::with_capacity(4);
    for i in 0..10i64 {
        queue.push(QueueEntry::LookupValueChange {
            state: "burst".to_string(),
            value: Value::int(i),
        });
    }
    assert_eq!(queue.stats().fresh, 6);

    let mut seen = Vec::new();
    while let Some(entry) = queue.get() {
        if let QueueEntry::LookupValueChange { value, .. } = &*entry {
            seen.push(value.clone());
        }
        queue.release(entry);
    }
    assert_eq!(seen, (0..10).map(Value::int).collect::<Vec<_>>());
    assert_eq!(queue.stats().free, 10);
    assert_eq!(queue.outstanding(), 0);
}

#[test]
fn concurrent_producers_keep_their_own_order() {
    let queue = Arc::new(InputQueue::with_capacity(16));
    let wake = Arc::new(Semaphore::new());
    let sink = EventSink::new(Arc::clone(&queue), Arc::clone(&wake));

    let producers: Vec<_> = (0..4)
        .map(|p| {
            let sink = sink.clone();
            thread::spawn(move || {
                for i in 0..100i64 {
                    sink.lookup_changed(format!("p{p}"), i);
                }
            })
        })
        .collect();
    for producer in producers {
        producer.join().unwrap();
    }

    let mut last = [-1i64; 4];
    let mut count = 0;
    while let Some(entry) = queue.get() {
        if let QueueEntry::LookupValueChange { state, value } = &*entry {
            let p: usize = state[1..].parse().unwrap();
            let v = value.as_f64().unwrap() as i64;
            assert!(v > last[p], "producer {p} out of order");
            last[p] = v;
            count += 1;
        }
        queue.release(entry);
    }
    assert_eq!(count, 400);
    assert_eq!(wake.drain(), 400);
    assert_eq!(queue.outstanding(), 0);
}

#[test]
fn flush_discards_without_applying() {
    let mut h = Harness::new();
    h.sink().lookup_changed("x", 1i64);
    assert_eq!(h.manager.queue().flush(), 1);
    h.settle();
    assert!(h.exec.cache().lookup_value("x").is_unknown());
    assert_eq!(h.manager.queue().outstanding(), 0);
}
