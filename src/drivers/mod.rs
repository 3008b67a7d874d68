//! Device drivers subsystem
//!
//! Organized by device class:
//! - `spi`: Serial bus transaction primitive and the W5100 SPI framing
//! - `gpio`: Reset and interrupt lines
//! - `timer`: Delays and bounded polling
//! - `net`: Network device drivers

pub mod gpio;
pub mod net;
pub mod spi;
pub mod timer;
