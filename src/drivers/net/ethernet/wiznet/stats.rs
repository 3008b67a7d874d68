//! Driver statistics.
//!
//! The W5100 has no MIB counters, so the driver counts in software. Counters
//! are updated from both the RX worker and sender threads without taking the
//! register lock.

use core::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
pub struct DriverStats {
    tx_packets: AtomicU64,
    tx_bytes: AtomicU64,
    tx_timeouts: AtomicU64,
    tx_buffer_full: AtomicU64,
    rx_packets: AtomicU64,
    rx_bytes: AtomicU64,
    rx_errors: AtomicU64,
}

/// Point-in-time copy of [`DriverStats`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PacketStats {
    pub tx_packets: u64,
    pub tx_bytes: u64,
    pub tx_timeouts: u64,
    pub tx_buffer_full: u64,
    pub rx_packets: u64,
    pub rx_bytes: u64,
    pub rx_errors: u64,
}

impl DriverStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_tx(&self, len: usize) {
        self.tx_packets.fetch_add(1, Ordering::Relaxed);
        self.tx_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_tx_timeout(&self) {
        self.tx_timeouts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_tx_buffer_full(&self) {
        self.tx_buffer_full.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_rx(&self, len: usize) {
        self.rx_packets.fetch_add(1, Ordering::Relaxed);
        self.rx_bytes.fetch_add(len as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_rx_error(&self) {
        self.rx_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> PacketStats {
        PacketStats {
            tx_packets: self.tx_packets.load(Ordering::Relaxed),
            tx_bytes: self.tx_bytes.load(Ordering::Relaxed),
            tx_timeouts: self.tx_timeouts.load(Ordering::Relaxed),
            tx_buffer_full: self.tx_buffer_full.load(Ordering::Relaxed),
            rx_packets: self.rx_packets.load(Ordering::Relaxed),
            rx_bytes: self.rx_bytes.load(Ordering::Relaxed),
            rx_errors: self.rx_errors.load(Ordering::Relaxed),
        }
    }
}
