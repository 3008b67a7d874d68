//! WIZnet W5100 / W5100S Ethernet Controller Driver (SPI)
//!
//! This driver runs hardware socket 0 in MACRAW mode, turning the chip into
//! a plain Ethernet MAC: whole frames go in and out of the on-chip rings and
//! the host network stack does everything above layer 2.
//!
//! # Implementation Notes
//!
//! - Socket 0 gets all 8 KiB of TX and RX buffer memory; sockets 1-3 get none
//! - Interrupt-driven receive: the INTn falling edge wakes a dedicated RX
//!   worker thread that drains every queued frame
//! - Synchronous transmit with at most one frame in flight; a send returns
//!   once the worker has seen its SENDOK, or fails with `TxTimeout`
//! - Register transactions go through one `spin::Mutex`; command
//!   acceptance polls hold a separate blocking lock instead
//!
//! # Threads
//!
//! ```text
//!   caller -- send() --> [tx_gate] --> TX ring, SEND --> [tx_done] --> give tx_gate
//!                                                            ^
//!   INTn edge --> callback --> [rx_signal] --> RX worker --> Sn_IR
//!                                                  |           SENDOK: give tx_done
//!                                                  |           RECV:   drain RX ring
//!                                                  +--> NetInterface::deliver()
//! ```
//!
//! # References
//!
//! - W5100 Datasheet v1.2.7
//! - W5100S Datasheet v1.0.1 (PHY registers)

mod access;
#[cfg(test)]
pub(crate) mod mock;
pub mod regs;
mod rx;
pub mod socket;
pub mod stats;
mod tx;
pub mod window;

pub use access::Registers;
pub use socket::SocketState;
pub use stats::{DriverStats, PacketStats};
pub use tx::Transmitter;

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::Arc;
use std::thread::JoinHandle;

use embedded_hal::digital::v2::OutputPin;
use log::{debug, info, warn};

use self::regs::{
    Interrupt, Mode, SocketInterrupt, IMR, MR, PHYCR0, PHYCR0_100_FDX, PHYSR, PHYSR_LNK,
    PHY_ACCESS_DELAY_US, RTR, RX_SIZE, SHAR, SN_RXMEM_SIZE, SN_TXMEM_SIZE, SOCKET_COUNT, TX_SIZE,
    socket_reg,
};
use self::socket::Socket;
use crate::config::Config;
use crate::drivers::gpio::{Edge, InterruptLine, ResetControl, ResetLine};
use crate::drivers::net::netdev::{NetworkDevice, NetworkError};
use crate::drivers::spi::Bus;
use crate::drivers::timer::{PollError, SystemTimer};
use crate::net::ethernet::{MacAddress, MacSource};
use crate::net::iface::NetInterface;
use crate::sync::{Semaphore, Signal};

/// Reset line hold time (datasheet minimum is 2 us; W5100S wants 500 us)
const RESET_HOLD: Duration = Duration::from_micros(500);

/// PLL lock time after the reset line is released
const RESET_SETTLE: Duration = Duration::from_millis(10);

/// Interval between MR polls during software reset
const RESET_POLL_INTERVAL: Duration = Duration::from_micros(100);

// ============================================================================
// Shared State
// ============================================================================

/// State shared between the owner, transmitter handles, the RX worker and
/// the interrupt callback.
pub(crate) struct Shared<B> {
    /// Socket 0 and the register space behind it
    pub(crate) socket: Socket<B>,
    /// At most one send in flight
    pub(crate) tx_gate: Semaphore,
    /// Given by the RX worker on SENDOK, awaited by the sender
    pub(crate) tx_done: Semaphore,
    /// Raised by the interrupt callback, awaited by the RX worker
    pub(crate) rx_signal: Signal,
    pub(crate) iface: Arc<dyn NetInterface>,
    pub(crate) stats: DriverStats,
    /// Bound on every wait (TX gate, status polls)
    pub(crate) timeout: Duration,
    /// Set once bring-up completed, cleared by teardown
    pub(crate) running: AtomicBool,
}

impl<B> Shared<B> {
    pub(crate) fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

// ============================================================================
// Driver
// ============================================================================

/// W5100 driver instance.
///
/// Construct with [`W5100::new`], attach a MAC source, then call
/// [`initialize`](Self::initialize). Dropping the driver shuts it down.
pub struct W5100<B: Bus + 'static> {
    shared: Arc<Shared<B>>,
    interrupt: Box<dyn InterruptLine>,
    reset: Option<Box<dyn ResetControl>>,
    mac_source: Option<MacSource>,
    mac_address: MacAddress,
    config: Config,
    worker: Option<JoinHandle<()>>,
    irq_attached: bool,
}

impl<B: Bus + 'static> W5100<B> {
    /// Create a driver for the chip behind `bus`.
    ///
    /// Nothing touches the hardware until [`initialize`](Self::initialize).
    pub fn new<I>(bus: B, interrupt: I, iface: Arc<dyn NetInterface>, config: Config) -> Self
    where
        I: InterruptLine + 'static,
    {
        let timeout = config.timeout;
        Self {
            shared: Arc::new(Shared {
                socket: Socket::new(Registers::new(bus), timeout),
                tx_gate: Semaphore::new(1, 1),
                tx_done: Semaphore::new(0, 1),
                rx_signal: Signal::new(),
                iface,
                stats: DriverStats::new(),
                timeout,
                running: AtomicBool::new(false),
            }),
            interrupt: Box::new(interrupt),
            reset: None,
            mac_source: None,
            mac_address: MacAddress::zero(),
            config,
            worker: None,
            irq_attached: false,
        }
    }

    /// Pulse this line at the start of every bring-up.
    pub fn with_reset<R>(mut self, reset: R) -> Self
    where
        R: ResetControl + 'static,
    {
        self.reset = Some(Box::new(reset));
        self
    }

    /// Reset through a GPIO pin, using the polarity from
    /// [`Config::reset_polarity`].
    ///
    /// The pin numbers in [`Config`] are for the board code that hands the
    /// driver its pins; the driver itself only ever sees pin objects.
    pub fn with_reset_pin<P>(self, pin: P) -> Self
    where
        P: OutputPin + Send + 'static,
    {
        let polarity = self.config.reset_polarity();
        self.with_reset(ResetLine::new(pin, polarity))
    }

    pub fn with_mac_source(mut self, source: MacSource) -> Self {
        self.mac_source = Some(source);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_initialized(&self) -> bool {
        self.shared.is_running()
    }

    /// Main initialization sequence
    ///
    /// Any failing step aborts bring-up and is returned as is; nothing is
    /// retried. Calling this on a running driver is a no-op.
    pub fn initialize(&mut self) -> Result<(), NetworkError> {
        if self.is_initialized() {
            return Ok(());
        }

        self.config.validate().map_err(|err| {
            warn!("[W5100] Rejecting configuration: {}", err);
            NetworkError::InvalidConfiguration
        })?;

        let mac = self
            .mac_source
            .as_mut()
            .ok_or(NetworkError::InvalidConfiguration)?
            .resolve();
        if !mac.is_valid_source() {
            warn!("[W5100] Unusable MAC address {}", mac);
            return Err(NetworkError::InvalidConfiguration);
        }

        info!("[W5100] Initializing...");

        if let Some(reset) = self.reset.as_mut() {
            reset.pulse(RESET_HOLD, RESET_SETTLE)?;
        }

        self.configure_chip(mac)?;
        self.mac_address = mac;

        // Fresh gates for this run; give() saturates at one
        self.shared.rx_signal.reset();
        self.shared.tx_gate.give();
        while self.shared.tx_done.try_take() {}
        self.shared.running.store(true, Ordering::Release);

        let worker = rx::spawn(Arc::clone(&self.shared)).map_err(|err| {
            warn!("[W5100] Could not start RX worker: {}", err);
            self.shared.running.store(false, Ordering::Release);
            NetworkError::WorkerSpawn
        })?;
        self.worker = Some(worker);

        let shared = Arc::clone(&self.shared);
        if let Err(err) = self
            .interrupt
            .enable(Edge::Falling, Box::new(move || shared.rx_signal.raise()))
        {
            warn!("[W5100] Could not attach interrupt: {}", err);
            self.stop_worker();
            return Err(err.into());
        }
        self.irq_attached = true;

        // An event that arrived between unmasking and attaching the callback
        // holds INTn low without ever producing an edge
        self.shared.rx_signal.raise();

        info!("[W5100] Initialization complete, MAC {}", mac);
        Ok(())
    }

    /// Register-level part of bring-up.
    fn configure_chip(&self, mac: MacAddress) -> Result<(), NetworkError> {
        let socket = &self.shared.socket;

        // Software reset
        socket.regs().write_u8(MR, Mode::RST.bits())?;
        match socket.poll(RESET_POLL_INTERVAL, |regs| {
            let mode = Mode::from_bits_truncate(regs.read_u8(MR)?);
            Ok((!mode.contains(Mode::RST)).then_some(()))
        }) {
            Ok(()) => {}
            Err(PollError::TimedOut { elapsed }) => {
                warn!("[W5100] Software reset did not complete after {:?}", elapsed);
                return Err(NetworkError::InitTimeout);
            }
            Err(PollError::Failed(err)) => return Err(err),
        }

        if self.config.full_duplex {
            socket.regs().write_u8(PHYCR0, PHYCR0_100_FDX)?;
            SystemTimer::delay_us(PHY_ACCESS_DELAY_US);
            debug!("[W5100] PHY forced to 100BASE-TX full duplex");
        }

        {
            let mut regs = socket.regs();
            regs.write(SHAR, mac.as_bytes())?;
            regs.write_u16(RTR, self.config.retry_time)?;

            // Whole buffer memory to socket 0, in KiB
            for n in 0..SOCKET_COUNT {
                let (rx_kib, tx_kib) = if n == 0 {
                    ((RX_SIZE / 1024) as u8, (TX_SIZE / 1024) as u8)
                } else {
                    (0, 0)
                };
                regs.write_u8(socket_reg(n, SN_RXMEM_SIZE), rx_kib)?;
                regs.write_u8(socket_reg(n, SN_TXMEM_SIZE), tx_kib)?;
            }
        }

        socket.open_macraw(self.config.mac_filter)?;

        socket.set_interrupt_mask(SocketInterrupt::SEND_OK | SocketInterrupt::RECV)?;
        socket.regs().write_u8(IMR, Interrupt::S0.bits())?;
        Ok(())
    }

    /// Stop the RX worker and wait for it to exit.
    fn stop_worker(&mut self) {
        self.shared.running.store(false, Ordering::Release);
        self.shared.rx_signal.close();
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            warn!("[W5100] RX worker panicked");
        }
    }

    /// Tear the driver down. Safe to call more than once.
    pub fn shutdown(&mut self) {
        if self.worker.is_none() && !self.irq_attached && self.socket_state() == SocketState::Closed
        {
            return;
        }

        self.stop_worker();

        if self.irq_attached {
            if let Err(err) = self.interrupt.disable() {
                warn!("[W5100] Could not detach interrupt: {}", err);
            }
            self.irq_attached = false;
        }

        let socket = &self.shared.socket;
        if socket.state() != SocketState::Closed
            && let Err(err) = socket.close()
        {
            warn!("[W5100] Socket close failed: {}", err);
        }

        self.shared.tx_gate.give();
        info!("[W5100] Shut down");
    }

    /// Cloneable send handle for other threads.
    pub fn transmitter(&self) -> Transmitter<B> {
        Transmitter::new(Arc::clone(&self.shared))
    }

    /// Blocking send; see [`Transmitter::send`].
    pub fn send(&self, frame: &[u8]) -> Result<(), NetworkError> {
        tx::send(&self.shared, frame)
    }

    /// Non-blocking send; see [`Transmitter::try_send`].
    pub fn try_send(&self, frame: &[u8]) -> Result<(), NetworkError> {
        tx::try_send(&self.shared, frame)
    }

    pub fn mac_address(&self) -> MacAddress {
        self.mac_address
    }

    pub fn stats(&self) -> PacketStats {
        self.shared.stats.snapshot()
    }

    pub fn socket_state(&self) -> SocketState {
        self.shared.socket.state()
    }

    /// PHY link status from PHYSR, read after the PHY access delay.
    pub fn link_up(&self) -> Result<bool, NetworkError> {
        if !self.is_initialized() {
            return Err(NetworkError::NotInitialized);
        }
        SystemTimer::delay_us(PHY_ACCESS_DELAY_US);
        let status = self.shared.socket.regs().read_u8(PHYSR)?;
        Ok(status & PHYSR_LNK != 0)
    }
}

impl<B: Bus + 'static> Drop for W5100<B> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<B: Bus + 'static> NetworkDevice for W5100<B> {
    fn init(&mut self) -> Result<(), NetworkError> {
        self.initialize()
    }

    fn transmit(&mut self, frame: &[u8]) -> Result<(), NetworkError> {
        self.send(frame)
    }

    fn mac_address(&self) -> MacAddress {
        self.mac_address
    }

    fn link_up(&self) -> bool {
        W5100::link_up(self).unwrap_or(false)
    }

    fn shutdown(&mut self) {
        W5100::shutdown(self)
    }
}

// ============================================================================
// Tests
// ============================================================================
