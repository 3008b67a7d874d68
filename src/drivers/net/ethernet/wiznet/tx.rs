//! Transmit path.
//!
//! A frame goes straight from the caller's buffer into the TX ring:
//!
//! 1. take the TX gate (one frame in flight)
//! 2. read Sn_TX_WR and Sn_TX_FSR
//! 3. copy the frame into the ring at Sn_TX_WR (one or two bus writes)
//! 4. advance Sn_TX_WR by the frame length
//! 5. issue SEND
//! 6. wait for the RX worker to report SENDOK
//! 7. give the gate back
//!
//! If SENDOK does not arrive within the timeout the send fails with
//! [`NetworkError::TxTimeout`]: the frame is considered lost and the gate is
//! released for the next sender.

use core::time::Duration;
use std::sync::Arc;

use log::{trace, warn};

use super::regs::{Command, S0_TX_FSR, S0_TX_WR};
use super::window::TX_WINDOW;
use super::Shared;
use crate::drivers::net::netdev::NetworkError;
use crate::drivers::spi::Bus;
use crate::net::ethernet::MAX_FRAME_SIZE;

/// Cloneable handle for sending from any thread.
pub struct Transmitter<B> {
    shared: Arc<Shared<B>>,
}

impl<B> Clone for Transmitter<B> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<B: Bus> Transmitter<B> {
    pub(crate) fn new(shared: Arc<Shared<B>>) -> Self {
        Self { shared }
    }

    /// Send one frame and wait for the chip to report it sent.
    ///
    /// Queues behind a send already in flight.
    pub fn send(&self, frame: &[u8]) -> Result<(), NetworkError> {
        send(&self.shared, frame)
    }

    /// Like [`send`](Self::send) but fails with `TxBusy` instead of queueing
    /// behind another send.
    pub fn try_send(&self, frame: &[u8]) -> Result<(), NetworkError> {
        try_send(&self.shared, frame)
    }

    pub fn is_ready(&self) -> bool {
        self.shared.is_running() && self.shared.tx_gate.available() > 0
    }
}

/// Longest a sender queues for the gate. A holder gives it back after at
/// most one command wait and one completion wait.
fn gate_wait(timeout: Duration) -> Duration {
    timeout.saturating_mul(2)
}

fn check_frame<B>(shared: &Shared<B>, frame: &[u8]) -> Result<(), NetworkError> {
    if !shared.is_running() {
        return Err(NetworkError::NotInitialized);
    }
    if frame.is_empty() {
        return Err(NetworkError::FrameTooSmall);
    }
    if frame.len() > MAX_FRAME_SIZE {
        return Err(NetworkError::FrameTooLarge);
    }
    Ok(())
}

pub(crate) fn send<B: Bus>(shared: &Shared<B>, frame: &[u8]) -> Result<(), NetworkError> {
    check_frame(shared, frame)?;

    if !shared.tx_gate.take(gate_wait(shared.timeout)) {
        trace!("[W5100] TX gate still held, {}-byte frame not sent", frame.len());
        return Err(NetworkError::TxBusy);
    }

    transmit_gated(shared, frame)
}

pub(crate) fn try_send<B: Bus>(shared: &Shared<B>, frame: &[u8]) -> Result<(), NetworkError> {
    check_frame(shared, frame)?;

    if !shared.tx_gate.try_take() {
        return Err(NetworkError::TxBusy);
    }

    transmit_gated(shared, frame)
}

/// Caller holds the TX gate; it is given back on every path.
fn transmit_gated<B: Bus>(shared: &Shared<B>, frame: &[u8]) -> Result<(), NetworkError> {
    let result = load_and_send(shared, frame).and_then(|wr| {
        if shared.tx_done.take(shared.timeout) {
            Ok(wr)
        } else {
            warn!(
                "[W5100] No SENDOK within {:?}, {}-byte frame lost",
                shared.timeout,
                frame.len()
            );
            shared.stats.record_tx_timeout();
            Err(NetworkError::TxTimeout)
        }
    });
    shared.tx_gate.give();

    match result {
        Ok(wr) => {
            shared.stats.record_tx(frame.len());
            trace!("[W5100] TX {} bytes, TX_WR now 0x{:04X}", frame.len(), wr);
            Ok(())
        }
        Err(err) => {
            if err == NetworkError::TxBufferFull {
                shared.stats.record_tx_buffer_full();
            }
            Err(err)
        }
    }
}

/// Copy `frame` into the TX ring and issue SEND. Returns the new Sn_TX_WR.
fn load_and_send<B: Bus>(shared: &Shared<B>, frame: &[u8]) -> Result<u16, NetworkError> {
    let len = frame.len() as u16;
    let next = {
        let mut regs = shared.socket.regs();

        let wr = regs.read_u16(S0_TX_WR)?;
        let free = regs.read_u16(S0_TX_FSR)?;
        if free < len {
            trace!("[W5100] TX ring has {} free, need {}", free, len);
            return Err(NetworkError::TxBufferFull);
        }

        regs.write_ring(&TX_WINDOW, wr, frame)?;
        let next = wr.wrapping_add(len);
        regs.write_u16(S0_TX_WR, next)?;
        next
    };

    // Drop a completion left over from a send that already timed out
    while shared.tx_done.try_take() {}

    shared.socket.command(Command::Send)?;
    Ok(next)
}
