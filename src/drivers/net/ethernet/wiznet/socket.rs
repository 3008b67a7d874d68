//! Socket command engine.
//!
//! Socket 0 state machine:
//!
//! ```text
//!            Sn_MR = MACRAW [| MF]
//!            Sn_CR = OPEN               Sn_SR == 0x42
//!   CLOSED ----------------> INIT ------------------> MACRAW-OPEN
//!     ^                                                    |
//!     +----------------------------------------------------+
//!                  Sn_CR = CLOSE, Sn_SR == 0x00
//! ```
//!
//! SEND and RECV do not change the state; the chip signals acceptance by
//! clearing Sn_CR back to 0.

use core::time::Duration;
use std::sync::{Mutex as BlockingMutex, MutexGuard as BlockingGuard, PoisonError};

use log::{debug, warn};
use spin::{Mutex, MutexGuard};

use super::access::Registers;
use super::regs::{
    Command, SocketInterrupt, SocketMode, S0_CR, S0_IMR, S0_IR, S0_MR, S0_SR, SR_CLOSED, SR_MACRAW,
};
use crate::drivers::net::netdev::NetworkError;
use crate::drivers::spi::Bus;
use crate::drivers::timer::{poll_timeout, PollError};

/// Interval between register polls while waiting on the chip.
const POLL_INTERVAL: Duration = Duration::from_micros(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SocketState {
    Closed,
    /// OPEN written, status not yet confirmed
    Init,
    MacRawOpen,
}

/// Socket 0 plus the register space it lives in.
///
/// Two locks:
///
/// - `regs` (spin) covers single register transactions and is never held
///   across a sleep
/// - `command` (blocking) is held from a Sn_CR write until the chip clears
///   it, so SEND and RECV from different threads never overlap
///
/// Lock order is `command` then `regs`.
pub struct Socket<B> {
    regs: Mutex<Registers<B>>,
    command: BlockingMutex<()>,
    state: Mutex<SocketState>,
    timeout: Duration,
}

impl<B: Bus> Socket<B> {
    pub fn new(regs: Registers<B>, timeout: Duration) -> Self {
        Self {
            regs: Mutex::new(regs),
            command: BlockingMutex::new(()),
            state: Mutex::new(SocketState::Closed),
            timeout,
        }
    }

    pub fn state(&self) -> SocketState {
        *self.state.lock()
    }

    fn set_state(&self, state: SocketState) {
        *self.state.lock() = state;
    }

    /// Lock the register space. Do not sleep while holding the guard.
    pub fn regs(&self) -> MutexGuard<'_, Registers<B>> {
        self.regs.lock()
    }

    fn command_section(&self) -> BlockingGuard<'_, ()> {
        self.command.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `probe` until it yields a value, taking the register lock for
    /// each attempt only.
    pub fn poll<T, F>(&self, interval: Duration, mut probe: F) -> Result<T, PollError<NetworkError>>
    where
        F: FnMut(&mut Registers<B>) -> Result<Option<T>, NetworkError>,
    {
        poll_timeout(self.timeout, interval, || probe(&mut *self.regs.lock()))
    }

    /// Open socket 0 in MACRAW mode and wait for the chip to confirm.
    pub fn open_macraw(&self, mac_filter: bool) -> Result<(), NetworkError> {
        let mut mode = SocketMode::MACRAW;
        if mac_filter {
            mode |= SocketMode::MF;
        }

        let _section = self.command_section();
        {
            let mut regs = self.regs();
            regs.write_u8(S0_MR, mode.bits())?;
            regs.write_u8(S0_CR, Command::Open as u8)?;
        }
        self.set_state(SocketState::Init);

        match self.poll(POLL_INTERVAL, |regs| {
            Ok((regs.read_u8(S0_SR)? == SR_MACRAW).then_some(()))
        }) {
            Ok(()) => {
                self.set_state(SocketState::MacRawOpen);
                debug!("[W5100] Socket 0 open (MACRAW, filter={})", mac_filter);
                Ok(())
            }
            Err(PollError::TimedOut { elapsed }) => {
                warn!("[W5100] Socket 0 did not reach MACRAW after {:?}", elapsed);
                Err(NetworkError::SocketOpenTimeout)
            }
            Err(PollError::Failed(err)) => Err(err),
        }
    }

    /// Close socket 0 and wait for status CLOSED.
    pub fn close(&self) -> Result<(), NetworkError> {
        let _section = self.command_section();
        self.regs().write_u8(S0_CR, Command::Close as u8)?;

        match self.poll(POLL_INTERVAL, |regs| {
            Ok((regs.read_u8(S0_SR)? == SR_CLOSED).then_some(()))
        }) {
            Ok(()) => {
                self.set_state(SocketState::Closed);
                Ok(())
            }
            Err(PollError::TimedOut { .. }) => Err(NetworkError::CommandTimeout),
            Err(PollError::Failed(err)) => Err(err),
        }
    }

    /// Issue SEND or RECV and wait until Sn_CR reads back 0.
    pub fn command(&self, command: Command) -> Result<(), NetworkError> {
        let _section = self.command_section();
        self.regs().write_u8(S0_CR, command as u8)?;

        self.poll(POLL_INTERVAL, |regs| Ok((regs.read_u8(S0_CR)? == 0).then_some(())))
            .map_err(|err| match err {
                PollError::TimedOut { elapsed } => {
                    warn!("[W5100] Command {:?} not accepted after {:?}", command, elapsed);
                    NetworkError::CommandTimeout
                }
                PollError::Failed(err) => err,
            })
    }

    /// Raw Sn_SR value.
    pub fn status(&self) -> Result<u8, NetworkError> {
        self.regs().read_u8(S0_SR)
    }

    /// Read Sn_IR and clear every bit that was set.
    ///
    /// Bits are written back before the caller acts on them, so an event that
    /// arrives while it is being handled raises the line again.
    pub fn take_interrupts(&self) -> Result<SocketInterrupt, NetworkError> {
        let mut regs = self.regs();
        let raw = regs.read_u8(S0_IR)?;
        if raw != 0 {
            regs.write_u8(S0_IR, raw)?;
        }
        Ok(SocketInterrupt::from_bits_truncate(raw))
    }

    pub fn set_interrupt_mask(&self, mask: SocketInterrupt) -> Result<(), NetworkError> {
        self.regs().write_u8(S0_IMR, mask.bits())
    }
}
