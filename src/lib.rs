//! WIZnet W5100 / W5100S Ethernet driver.
//!
//! Drives the chip over SPI with hardware socket 0 in MACRAW mode, so the
//! host network stack sees a plain Ethernet interface.
//!
//! ```ignore
//! let bus = SpiBus::new(spi, cs)?;
//! let queue = Arc::new(FrameQueue::new(32));
//! let config = Config::from_device_tree(dtb)?;
//! let mut eth = W5100::new(bus, irq_line, queue.clone(), config)
//!     .with_reset_pin(rst_pin)
//!     .with_mac_source(MacSource::Fixed(MacAddress::wiznet([0x12, 0x34, 0x56])));
//! eth.initialize()?;
//!
//! let device = SmoltcpDevice::new(queue, eth.transmitter());
//! ```
//!
//! The crate never installs a logger; messages go through the `log` facade.

pub mod config;
pub mod drivers;
pub mod dt;
pub mod net;
pub mod sync;

pub use config::{Config, ConfigError};
pub use drivers::gpio::{Edge, InterruptLine, Polarity, ResetControl, ResetLine};
pub use drivers::net::ethernet::wiznet::{PacketStats, SocketState, Transmitter, W5100};
pub use drivers::net::{NetworkDevice, NetworkError};
pub use drivers::spi::{Bus, SpiBus, Transaction};
pub use net::{FrameQueue, MacAddress, MacSource, NetInterface, SmoltcpDevice};
