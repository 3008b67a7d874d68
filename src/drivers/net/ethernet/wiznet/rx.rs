//! RX worker.
//!
//! One thread per driver instance, blocked on the wake signal the interrupt
//! callback raises. Each wake services Sn_IR until it reads empty:
//!
//! - SENDOK completes the send waiting in the TX path
//! - the RX ring is drained on every pass, not only on RECV, so a frame
//!   that arrived between the interrupt read and the clear is not stranded
//!
//! MACRAW ring entry layout:
//!
//! ```text
//! +----------+----------+---------------------------+
//! | len (hi) | len (lo) |  frame (len - 2 bytes)    |
//! +----------+----------+---------------------------+
//! ```
//!
//! The length counts its own two bytes.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::{debug, error, trace, warn};

use super::regs::{Command, SocketInterrupt, RX_HEADER_LEN, S0_RX_RD, S0_RX_RSR};
use super::window::RX_WINDOW;
use super::Shared;
use crate::drivers::net::netdev::NetworkError;
use crate::drivers::spi::Bus;
use crate::net::ethernet::{FrameHeader, MAX_FRAME_SIZE};
use crate::sync::Wake;

const WORKER_NAME: &str = "w5100-rx";

pub(crate) fn spawn<B: Bus + 'static>(shared: Arc<Shared<B>>) -> io::Result<JoinHandle<()>> {
    thread::Builder::new()
        .name(WORKER_NAME.into())
        .spawn(move || run(&shared))
}

fn run<B: Bus>(shared: &Shared<B>) {
    // Frame assembly buffer, reused for every frame
    let mut buffer = vec![0u8; MAX_FRAME_SIZE];
    debug!("[W5100] RX worker started");

    loop {
        match shared.rx_signal.wait() {
            Wake::Closed => break,
            Wake::Raised | Wake::TimedOut => service(shared, &mut buffer),
        }
    }

    debug!("[W5100] RX worker stopped");
}

/// Handle socket events until Sn_IR reads empty.
fn service<B: Bus>(shared: &Shared<B>, buffer: &mut [u8]) {
    loop {
        let pending = match shared.socket.take_interrupts() {
            Ok(pending) => pending,
            Err(err) => {
                error!("[W5100] Reading Sn_IR failed: {}", err);
                return;
            }
        };

        if pending.contains(SocketInterrupt::SEND_OK) {
            trace!("[W5100] SENDOK");
            shared.tx_done.give();
        }

        match drain(shared, buffer) {
            Ok(0) => {}
            Ok(count) => trace!("[W5100] Drained {} frames", count),
            Err(err) => {
                warn!("[W5100] RX drain aborted: {}", err);
                return;
            }
        }

        if pending.is_empty() {
            return;
        }
    }
}

/// Deliver every complete frame in the RX ring. Returns the frame count.
///
/// The register lock is dropped before RECV and before each delivery, so
/// senders are not held up by the command wait or the network stack.
fn drain<B: Bus>(shared: &Shared<B>, buffer: &mut [u8]) -> Result<usize, NetworkError> {
    let mut delivered = 0;

    loop {
        let socket = &shared.socket;
        let body_len = {
            let mut regs = socket.regs();

            let available = regs.read_u16(S0_RX_RSR)?;
            if available == 0 {
                return Ok(delivered);
            }

            let rd = regs.read_u16(S0_RX_RD)?;
            let mut header = [0u8; RX_HEADER_LEN];
            regs.read_ring(&RX_WINDOW, rd, &mut header)?;
            let total = u16::from_be_bytes(header);
            let body_len = (total as usize).saturating_sub(RX_HEADER_LEN);

            if body_len == 0 || body_len > buffer.len() || total > available {
                warn!(
                    "[W5100] Corrupt RX header (len {}, {} queued), discarding ring",
                    total, available
                );
                regs.write_u16(S0_RX_RD, rd.wrapping_add(available))?;
                None
            } else {
                regs.read_ring(
                    &RX_WINDOW,
                    rd.wrapping_add(RX_HEADER_LEN as u16),
                    &mut buffer[..body_len],
                )?;
                regs.write_u16(S0_RX_RD, rd.wrapping_add(total))?;
                Some(body_len)
            }
        };
        socket.command(Command::Recv)?;

        let Some(body_len) = body_len else {
            shared.stats.record_rx_error();
            continue;
        };

        let frame = &buffer[..body_len];
        if let Some(header) = FrameHeader::parse(frame) {
            trace!(
                "[W5100] RX {} bytes from {} type 0x{:04X}",
                body_len,
                header.source,
                header.ethertype
            );
        }
        shared.stats.record_rx(body_len);
        shared.iface.deliver(frame);
        delivered += 1;
    }
}
