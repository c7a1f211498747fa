//! Blocking primitives for the worker thread.

use parking_lot::{Condvar, Mutex};
use std::time::Duration;

/// Counting semaphore.
#[derive(Debug, Default)]
pub struct Semaphore {
    count: Mutex<u64>,
    cond: Condvar,
}

impl Semaphore {
    /// Create a semaphore with no permits.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a permit and wake one waiter.
    pub fn post(&self) {
        *self.count.lock() += 1;
        self.cond.notify_one();
    }

    /// Block until a permit is available, then take it.
    pub fn wait(&self) {
        let mut count = self.count.lock();
        while *count == 0 {
            self.cond.wait(&mut count);
        }
        *count -= 1;
    }

    /// Take a permit, waiting at most `timeout`. Returns false on timeout.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let mut count = self.count.lock();
        while *count == 0 {
            if self.cond.wait_for(&mut count, timeout).timed_out() {
                if *count == 0 {
                    return false;
                }
                break;
            }
        }
        *count -= 1;
        true
    }

    /// Take a permit if one is available.
    pub fn try_wait(&self) -> bool {
        let mut count = self.count.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Drop every pending permit. Returns how many were dropped.
    pub fn drain(&self) -> u64 {
        std::mem::take(&mut *self.count.lock())
    }
}
