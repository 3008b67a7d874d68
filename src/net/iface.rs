//! Binding between the driver and a network stack.
//!
//! Ingress is pushed: the RX worker calls [`NetInterface::deliver`] once per
//! frame from its own thread. [`FrameQueue`] is the stock sink, a bounded
//! queue a stack polls at its own pace, and [`SmoltcpDevice`] wraps it
//! together with a [`Transmitter`] as a smoltcp `phy::Device`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use log::{trace, warn};
use smoltcp::phy::{self, DeviceCapabilities, Medium};
use smoltcp::time::Instant;
use spin::Mutex;

use crate::drivers::net::ethernet::wiznet::Transmitter;
use crate::drivers::spi::Bus;
use crate::net::ethernet::MAX_FRAME_SIZE;

/// Receives frames from the driver.
///
/// Called on the RX worker thread. Implementations should hand the frame
/// off quickly; the worker delivers the next frame only after this returns.
pub trait NetInterface: Send + Sync {
    fn deliver(&self, frame: &[u8]);
}

/// Bounded FIFO of received frames.
///
/// When full, new frames are dropped and counted.
pub struct FrameQueue {
    frames: Mutex<VecDeque<Vec<u8>>>,
    capacity: usize,
    dropped: AtomicU64,
}

impl FrameQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            frames: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            dropped: AtomicU64::new(0),
        }
    }

    pub fn pop(&self) -> Option<Vec<u8>> {
        self.frames.lock().pop_front()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.lock().is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Frames lost because the queue was full.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl NetInterface for FrameQueue {
    fn deliver(&self, frame: &[u8]) {
        let mut frames = self.frames.lock();
        if frames.len() >= self.capacity {
            drop(frames);
            self.dropped.fetch_add(1, Ordering::Relaxed);
            trace!("[W5100] Ingress queue full, dropping {}-byte frame", frame.len());
            return;
        }
        frames.push_back(frame.to_vec());
    }
}

// ============================================================================
// smoltcp Device
// ============================================================================

/// Largest payload handed to smoltcp: an untagged frame without FCS.
pub const MTU: usize = MAX_FRAME_SIZE - 4;

pub struct SmoltcpDevice<B> {
    queue: Arc<FrameQueue>,
    tx: Transmitter<B>,
}

impl<B: Bus> SmoltcpDevice<B> {
    /// `queue` must be the interface the driver was constructed with.
    pub fn new(queue: Arc<FrameQueue>, tx: Transmitter<B>) -> Self {
        Self { queue, tx }
    }

    pub fn queue(&self) -> &Arc<FrameQueue> {
        &self.queue
    }
}

pub struct RxToken {
    frame: Vec<u8>,
}

pub struct TxToken<'a, B> {
    tx: &'a Transmitter<B>,
}

impl<B: Bus> phy::Device for SmoltcpDevice<B> {
    type RxToken<'a>
        = RxToken
    where
        Self: 'a;
    type TxToken<'a>
        = TxToken<'a, B>
    where
        Self: 'a;

    fn receive(&mut self, _timestamp: Instant) -> Option<(Self::RxToken<'_>, Self::TxToken<'_>)> {
        let frame = self.queue.pop()?;
        Some((RxToken { frame }, TxToken { tx: &self.tx }))
    }

    fn transmit(&mut self, _timestamp: Instant) -> Option<Self::TxToken<'_>> {
        // Back-pressure while a frame is in flight
        if !self.tx.is_ready() {
            return None;
        }
        Some(TxToken { tx: &self.tx })
    }

    fn capabilities(&self) -> DeviceCapabilities {
        let mut caps = DeviceCapabilities::default();
        caps.max_transmission_unit = MTU;
        caps.max_burst_size = Some(1);
        caps.medium = Medium::Ethernet;
        caps
    }
}

impl phy::RxToken for RxToken {
    fn consume<R, F>(mut self, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        f(&mut self.frame)
    }
}

impl<B: Bus> phy::TxToken for TxToken<'_, B> {
    fn consume<R, F>(self, len: usize, f: F) -> R
    where
        F: FnOnce(&mut [u8]) -> R,
    {
        let mut buffer = vec![0u8; len];
        let result = f(&mut buffer);

        if let Err(err) = self.tx.send(&buffer) {
            warn!("[W5100] smoltcp TX of {} bytes failed: {}", len, err);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::drivers::net::ethernet::wiznet::W5100;
    use crate::drivers::net::ethernet::wiznet::mock::{MockBus, MockChip};
    use crate::net::ethernet::{MacAddress, MacSource};
    use core::time::Duration;
    use smoltcp::phy::{Device, RxToken as _, TxToken as _};

    #[test]
    fn test_queue_is_fifo() {
        let queue = FrameQueue::new(4);
        queue.deliver(&[1]);
        queue.deliver(&[2, 2]);
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(), Some(vec![1]));
        assert_eq!(queue.pop(), Some(vec![2, 2]));
        assert!(queue.is_empty());
    }

    #[test]
    fn test_queue_drops_when_full() {
        let queue = FrameQueue::new(2);
        for i in 0..5u8 {
            queue.deliver(&[i]);
        }
        assert_eq!(queue.len(), 2);
        assert_eq!(queue.dropped(), 3);
        assert_eq!(queue.pop(), Some(vec![0]));
    }

    fn device(chip: &MockChip) -> (W5100<MockBus>, SmoltcpDevice<MockBus>) {
        let queue = Arc::new(FrameQueue::new(8));
        let mut dev = W5100::new(chip.bus(), chip.irq(), queue.clone(), Config::default())
            .with_mac_source(MacSource::Fixed(MacAddress::wiznet([0, 0, 3])));
        dev.initialize().unwrap();
        let smol = SmoltcpDevice::new(queue, dev.transmitter());
        (dev, smol)
    }

    #[test]
    fn test_capabilities() {
        let chip = MockChip::new();
        let (_dev, smol) = device(&chip);
        let caps = smol.capabilities();
        assert_eq!(caps.max_transmission_unit, 1514);
        assert_eq!(caps.max_burst_size, Some(1));
        assert_eq!(caps.medium, Medium::Ethernet);
    }

    #[test]
    fn test_rx_token_yields_delivered_frame() {
        let chip = MockChip::new();
        let (_dev, mut smol) = device(&chip);

        chip.inject_frame(&[0x5A; 60]);
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while smol.queue().is_empty() && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        let len = {
            let (rx, _tx) = smol.receive(Instant::from_millis(0)).unwrap();
            rx.consume(|frame| frame.len())
        };
        assert_eq!(len, 60);
        assert!(smol.receive(Instant::from_millis(0)).is_none());
    }

    #[test]
    fn test_tx_token_sends_frame() {
        let chip = MockChip::new();
        let (_dev, mut smol) = device(&chip);

        let tx = smol.transmit(Instant::from_millis(0)).unwrap();
        tx.consume(42, |buf| buf.fill(0xC3));
        assert_eq!(chip.sent_frames(), vec![vec![0xC3; 42]]);
    }

    #[test]
    fn test_no_tx_token_while_in_flight() {
        use crate::drivers::net::ethernet::wiznet::regs::Command;

        let chip = MockChip::new();
        chip.set_auto_sendok(false);
        let (dev, mut smol) = device(&chip);

        let tx = dev.transmitter();
        let sender = std::thread::spawn(move || tx.send(&[1u8; 60]));
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while chip.command_count(Command::Send) == 0 && std::time::Instant::now() < deadline {
            std::thread::sleep(Duration::from_millis(1));
        }

        assert!(smol.transmit(Instant::from_millis(0)).is_none());
        chip.complete_send();
        sender.join().unwrap().unwrap();
        assert!(smol.transmit(Instant::from_millis(0)).is_some());
    }
}
