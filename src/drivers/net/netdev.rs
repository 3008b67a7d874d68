//! Network Device Abstraction
//!
//! This module provides the trait network device drivers implement and the
//! error type shared by every fallible driver operation.
//!
//! ## Design Philosophy
//!
//! Egress is a synchronous call into the driver. Ingress is push-based: the
//! driver owns a receive thread and hands every frame to a
//! [`NetInterface`](crate::net::iface::NetInterface) supplied at construction,
//! so there is no `receive()` to poll.
//!
//! ## Current Implementations
//!
//! - `W5100` - WIZnet W5100/W5100S over SPI, socket 0 in MACRAW mode
//!
//! ## Example Usage
//!
//! ```ignore
//! use w5100::drivers::net::NetworkDevice;
//!
//! let mut netdev = W5100::new(bus, irq, iface, Config::default())
//!     .with_mac_source(MacSource::Fixed(mac));
//! netdev.init()?;
//! netdev.transmit(&frame)?;
//! netdev.shutdown();
//! ```

use core::fmt;

use crate::drivers::gpio::GpioError;
use crate::net::ethernet::MacAddress;

/// Errors that can occur during network device operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkError {
    /// Device is not initialized
    NotInitialized,

    /// The serial bus transaction failed
    BusError,

    /// Software reset bit never cleared
    InitTimeout,

    /// Socket status never reached MACRAW after OPEN
    SocketOpenTimeout,

    /// The chip did not accept a socket command
    CommandTimeout,

    /// Not enough free space in the TX ring (try again later)
    TxBufferFull,

    /// Completion of the previous send was never reported; the frame is lost
    TxTimeout,

    /// A send is in flight and the caller asked not to wait
    TxBusy,

    /// Frame is too large for device
    FrameTooLarge,

    /// Frame is empty
    FrameTooSmall,

    /// Reset or interrupt line could not be driven
    Gpio(GpioError),

    /// The RX worker thread could not be started
    WorkerSpawn,

    /// Invalid configuration or parameter
    InvalidConfiguration,
}

impl fmt::Display for NetworkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkError::NotInitialized => write!(f, "Device not initialized"),
            NetworkError::BusError => write!(f, "Bus transaction failed"),
            NetworkError::InitTimeout => write!(f, "Software reset timeout"),
            NetworkError::SocketOpenTimeout => write!(f, "Socket open timeout"),
            NetworkError::CommandTimeout => write!(f, "Socket command timeout"),
            NetworkError::TxBufferFull => write!(f, "Transmit buffer full"),
            NetworkError::TxTimeout => write!(f, "Transmit timeout"),
            NetworkError::TxBusy => write!(f, "Transmit in progress"),
            NetworkError::FrameTooLarge => write!(f, "Frame too large"),
            NetworkError::FrameTooSmall => write!(f, "Frame too small"),
            NetworkError::Gpio(err) => write!(f, "{}", err),
            NetworkError::WorkerSpawn => write!(f, "Failed to start RX worker"),
            NetworkError::InvalidConfiguration => write!(f, "Invalid configuration"),
        }
    }
}

impl std::error::Error for NetworkError {}

impl From<GpioError> for NetworkError {
    fn from(err: GpioError) -> Self {
        NetworkError::Gpio(err)
    }
}

/// Network device abstraction trait
///
/// This trait defines the minimal interface for Ethernet network devices.
/// Implementations provide hardware-specific details for frame TX.
///
/// # Thread Safety
///
/// The trait takes `&mut self` for lifecycle operations. Drivers that support
/// concurrent senders expose a cloneable handle of their own for that.
pub trait NetworkDevice {
    /// Initialize the network device
    ///
    /// Performs all necessary hardware initialization: reset, MAC address,
    /// buffer setup, interrupt routing and receive-path start-up.
    ///
    /// This must be called before `transmit()`.
    ///
    /// # Errors
    ///
    /// - `BusError` - The chip could not be reached
    /// - `InitTimeout` / `SocketOpenTimeout` - The chip never reported ready
    /// - `Gpio` - Reset or interrupt line failure
    #[must_use = "init() failure must be handled - device may not be operational"]
    fn init(&mut self) -> Result<(), NetworkError>;

    /// Transmit an Ethernet frame
    ///
    /// Sends a complete Ethernet frame (including header, excluding FCS).
    /// Returns once the frame is handed to the hardware; it does NOT wait for
    /// transmission to complete.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` - Must call `init()` first
    /// - `FrameTooSmall` / `FrameTooLarge` - Length out of range
    /// - `TxBufferFull` - Hardware buffer full, try again
    /// - `TxTimeout` - Previous transmission never completed
    #[must_use = "transmit() failure must be handled - frame may not have been sent"]
    fn transmit(&mut self, frame: &[u8]) -> Result<(), NetworkError>;

    /// Get the device's MAC address
    fn mac_address(&self) -> MacAddress;

    /// Get link status (optional, returns false by default)
    ///
    /// Devices with PHYs should override this.
    fn link_up(&self) -> bool {
        false
    }

    /// Stop the device and release its resources. Idempotent.
    fn shutdown(&mut self);
}
