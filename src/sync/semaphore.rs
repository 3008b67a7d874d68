//! Counting semaphore with bounded waits.
//!
//! The TX path uses two: the gate (capacity 1, starts full) held for a whole
//! send, and the completion (capacity 1, starts empty) that the RX worker
//! gives on SENDOK.
//!
//! ## Saturation
//!
//! `give()` never raises the count above the limit. A SENDOK that arrives
//! after its sender already timed out leaves at most one stale completion,
//! which the next sender discards before issuing SEND.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

pub struct Semaphore {
    count: Mutex<usize>,
    available: Condvar,
    limit: usize,
}

impl Semaphore {
    /// Create a semaphore holding `initial` units, capped at `limit`.
    pub const fn new(initial: usize, limit: usize) -> Self {
        let initial = if initial > limit { limit } else { initial };
        Self {
            count: Mutex::new(initial),
            available: Condvar::new(),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, usize> {
        // The count is a plain integer; a panicking holder cannot leave it torn.
        self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take one unit, waiting at most `timeout`.
    ///
    /// Returns `false` if no unit became available in time.
    pub fn take(&self, timeout: Duration) -> bool {
        let guard = self.lock();
        let (mut count, _) = self
            .available
            .wait_timeout_while(guard, timeout, |count| *count == 0)
            .unwrap_or_else(PoisonError::into_inner);

        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Take one unit only if it is available right now.
    pub fn try_take(&self) -> bool {
        let mut count = self.lock();
        if *count == 0 {
            return false;
        }
        *count -= 1;
        true
    }

    /// Return one unit and wake a waiter. Saturates at the limit.
    pub fn give(&self) {
        let mut count = self.lock();
        if *count < self.limit {
            *count += 1;
        }
        drop(count);
        self.available.notify_one();
    }

    /// Units currently available.
    pub fn available(&self) -> usize {
        *self.lock()
    }
}

// ============================================================================
// Tests
// ============================================================================
