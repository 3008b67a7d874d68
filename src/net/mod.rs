//! Network layer glue
//!
//! Ethernet addressing and framing helpers, and the interface through which
//! the driver hands frames to a network stack.

pub mod ethernet;
pub mod iface;

// Re-export commonly used types
pub use ethernet::{FrameHeader, MAX_FRAME_SIZE, MacAddress, MacSource, ParseMacError};
pub use iface::{FrameQueue, NetInterface, SmoltcpDevice};
