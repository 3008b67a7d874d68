//! Monotonic clock, delays and bounded polling.
//!
//! The W5100 reports completion of almost everything (software reset, socket
//! open, command acceptance) by flipping a register bit some time after the
//! triggering write. The driver never spins on those bits without a bound:
//! every wait goes through [`poll_timeout`], which returns a typed result the
//! caller maps onto its own error.
//!
//! ## Timing constraints
//!
//! | Constraint              | Value  | Source                         |
//! |-------------------------|--------|--------------------------------|
//! | Reset pulse width       | 500 us | W5100S datasheet, RSTn timing  |
//! | PLL lock after reset    | 10 ms  | W5100S datasheet               |
//! | PHY register access     | 26 us  | 25.6 us PHY access delay       |

use std::sync::OnceLock;
use std::thread;
use std::time::{Duration, Instant};

/// Process-wide time origin for [`SystemTimer::timestamp_us`].
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Host clock used for driver delays and timestamps.
pub struct SystemTimer;

impl SystemTimer {
    /// Microseconds since the first call into the timer.
    ///
    /// Monotonic; used for stats and log correlation only.
    pub fn timestamp_us() -> u64 {
        let epoch = EPOCH.get_or_init(Instant::now);
        epoch.elapsed().as_micros() as u64
    }

    /// Block the calling thread for at least `microseconds`.
    ///
    /// Sleeps rather than busy-waits; the scheduler may oversleep, which is
    /// always safe for the chip's minimum-delay constraints.
    pub fn delay_us(microseconds: u64) {
        thread::sleep(Duration::from_micros(microseconds));
    }

    /// Block the calling thread for at least `milliseconds`.
    #[inline]
    pub fn delay_ms(milliseconds: u64) {
        Self::delay_us(milliseconds.saturating_mul(1000));
    }
}

/// Why a [`poll_timeout`] loop gave up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollError<E> {
    /// The condition never held within the timeout.
    TimedOut {
        /// Time spent polling before giving up.
        elapsed: Duration,
    },
    /// The probe itself failed; polling stopped immediately.
    Failed(E),
}

/// Repeatedly run `probe` until it yields a value, fails, or `timeout` elapses.
///
/// The probe runs at least once, even with a zero timeout. Between attempts
/// the thread sleeps for `interval` (clamped to the remaining time).
///
/// ```ignore
/// let mode = poll_timeout(timeout, Duration::from_micros(100), || {
///     let mr = regs.read_u8(MR)?;
///     Ok((mr & MR_RST == 0).then_some(mr))
/// });
/// ```
pub fn poll_timeout<T, E, F>(
    timeout: Duration,
    interval: Duration,
    mut probe: F,
) -> Result<T, PollError<E>>
where
    F: FnMut() -> Result<Option<T>, E>,
{
    let start = Instant::now();
    loop {
        if let Some(value) = probe().map_err(PollError::Failed)? {
            return Ok(value);
        }

        let elapsed = start.elapsed();
        if elapsed >= timeout {
            return Err(PollError::TimedOut { elapsed });
        }
        thread::sleep(interval.min(timeout - elapsed));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_is_monotonic() {
        let mut last = SystemTimer::timestamp_us();
        for _ in 0..10 {
            let current = SystemTimer::timestamp_us();
            assert!(current >= last, "Timer went backwards: {} -> {}", last, current);
            last = current;
        }
    }

    #[test]
    fn test_delay_us_actually_delays() {
        let start = Instant::now();
        SystemTimer::delay_us(500);
        assert!(start.elapsed() >= Duration::from_micros(500));
    }

    #[test]
    fn test_poll_succeeds_after_retries() {
        let mut attempts = 0;
        let result: Result<u32, PollError<()>> =
            poll_timeout(Duration::from_secs(1), Duration::from_micros(10), || {
                attempts += 1;
                Ok((attempts == 3).then_some(42))
            });
        assert_eq!(result, Ok(42));
        assert_eq!(attempts, 3);
    }

    #[test]
    fn test_poll_times_out_within_bound() {
        let start = Instant::now();
        let result: Result<(), PollError<()>> =
            poll_timeout(Duration::from_millis(20), Duration::from_millis(1), || Ok(None));

        match result {
            Err(PollError::TimedOut { elapsed }) => {
                assert!(elapsed >= Duration::from_millis(20));
            }
            other => panic!("expected timeout, got {:?}", other),
        }
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_poll_probes_once_with_zero_timeout() {
        let mut attempts = 0;
        let result: Result<u8, PollError<()>> =
            poll_timeout(Duration::ZERO, Duration::from_millis(1), || {
                attempts += 1;
                Ok(Some(7))
            });
        assert_eq!(result, Ok(7));
        assert_eq!(attempts, 1);
    }

    #[test]
    fn test_poll_stops_on_probe_failure() {
        let mut attempts = 0;
        let result: Result<(), PollError<&str>> =
            poll_timeout(Duration::from_secs(1), Duration::from_micros(10), || {
                attempts += 1;
                Err("bus fault")
            });
        assert_eq!(result, Err(PollError::Failed("bus fault")));
        assert_eq!(attempts, 1);
    }
}
