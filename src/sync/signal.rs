//! Binary wake signal with a termination flag.
//!
//! The interrupt callback raises the signal; the RX worker waits on it. Any
//! number of raises before the worker wakes coalesce into one wake, which is
//! fine because the worker drains the chip completely on every wake.
//!
//! Closing the signal is how teardown reaches a worker that is blocked in
//! [`Signal::wait`]: a closed signal wakes every waiter with [`Wake::Closed`],
//! and `Closed` takes precedence over a pending raise.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Outcome of waiting on a [`Signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Raised,
    Closed,
    TimedOut,
}

#[derive(Default)]
struct State {
    raised: bool,
    closed: bool,
}

#[derive(Default)]
pub struct Signal {
    state: Mutex<State>,
    changed: Condvar,
}

impl Signal {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the signal raised and wake the waiter. Never blocks for long.
    pub fn raise(&self) {
        self.lock().raised = true;
        self.changed.notify_one();
    }

    /// Wake all waiters for good; subsequent waits return immediately.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_all();
    }

    /// Clear both flags so the signal can be reused after a restart.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.raised = false;
        state.closed = false;
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Block until raised or closed. Consumes the raise.
    pub fn wait(&self) -> Wake {
        let guard = self.lock();
        let mut state = self
            .changed
            .wait_while(guard, |state| !state.raised && !state.closed)
            .unwrap_or_else(PoisonError::into_inner);
        Self::consume(&mut state)
    }

    /// Like [`wait`](Self::wait) but gives up after `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> Wake {
        let guard = self.lock();
        let (mut state, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |state| !state.raised && !state.closed)
            .unwrap_or_else(PoisonError::into_inner);
        Self::consume(&mut state)
    }

    fn consume(state: &mut State) -> Wake {
        if state.closed {
            Wake::Closed
        } else if state.raised {
            state.raised = false;
            Wake::Raised
        } else {
            Wake::TimedOut
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_raises_coalesce() {
        let signal = Signal::new();
        signal.raise();
        signal.raise();
        signal.raise();
        assert_eq!(signal.wait(), Wake::Raised);
        assert_eq!(signal.wait_timeout(Duration::from_millis(5)), Wake::TimedOut);
    }

    #[test]
    fn test_close_takes_precedence() {
        let signal = Signal::new();
        signal.raise();
        signal.close();
        assert_eq!(signal.wait(), Wake::Closed);
        assert_eq!(signal.wait(), Wake::Closed);
    }

    #[test]
    fn test_close_unblocks_waiter() {
        let signal = Arc::new(Signal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            thread::spawn(move || signal.wait())
        };

        thread::sleep(Duration::from_millis(10));
        signal.close();
        assert_eq!(waiter.join().unwrap(), Wake::Closed);
    }

    #[test]
    fn test_reset_reopens() {
        let signal = Signal::new();
        signal.close();
        signal.reset();
        assert!(!signal.is_closed());
        assert_eq!(signal.wait_timeout(Duration::from_millis(1)), Wake::TimedOut);
    }
}
