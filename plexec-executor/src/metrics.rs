//! Scheduler counters.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters updated by the worker and read from any thread.
#[derive(Debug, Default)]
pub struct ExecMetrics {
    /// Steps run.
    pub steps: AtomicU64,
    /// Scan passes run.
    pub passes: AtomicU64,
    /// Node transitions performed.
    pub transitions: AtomicU64,
    /// Commands handed to the interface.
    pub commands_dispatched: AtomicU64,
    /// Commands refused by resource arbitration.
    pub commands_denied: AtomicU64,
    /// Assignments performed.
    pub assignments_performed: AtomicU64,
    /// Input queue records applied.
    pub queue_entries_processed: AtomicU64,
}

impl ExecMetrics {
    pub(crate) fn record_step(&self, passes: u64, transitions: u64) {
        self.steps.fetch_add(1, Ordering::Relaxed);
        self.passes.fetch_add(passes, Ordering::Relaxed);
        self.transitions.fetch_add(transitions, Ordering::Relaxed);
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Copy the current values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            steps: self.steps.load(Ordering::Relaxed),
            passes: self.passes.load(Ordering::Relaxed),
            transitions: self.transitions.load(Ordering::Relaxed),
            commands_dispatched: self.commands_dispatched.load(Ordering::Relaxed),
            commands_denied: self.commands_denied.load(Ordering::Relaxed),
            assignments_performed: self.assignments_performed.load(Ordering::Relaxed),
            queue_entries_processed: self.queue_entries_processed.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of [`ExecMetrics`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(missing_docs)]
pub struct MetricsSnapshot {
    pub steps: u64,
    pub passes: u64,
    pub transitions: u64,
    pub commands_dispatched: u64,
    pub commands_denied: u64,
    pub assignments_performed: u64,
    pub queue_entries_processed: u64,
}

impl MetricsSnapshot {
    /// Share of arbitrated commands that were denied.
    pub fn denial_rate(&self) -> f64 {
        let total = self.commands_dispatched + self.commands_denied;
        if total == 0 {
            0.0
        } else {
            self.commands_denied as f64 / total as f64
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_counters() {
        let metrics = ExecMetrics::default();
        metrics.record_step(3, 7);
        ExecMetrics::add(&metrics.commands_dispatched, 3);
        ExecMetrics::add(&metrics.commands_denied, 1);
        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.steps, 1);
        assert_eq!(snapshot.passes, 3);
        assert_eq!(snapshot.transitions, 7);
        assert!((snapshot.denial_rate() - 0.25).abs() < f64::EPSILON);
        assert_eq!(MetricsSnapshot::default().denial_rate(), 0.0);
    }
}
