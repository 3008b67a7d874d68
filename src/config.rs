//! Driver configuration.
//!
//! Built in code with the `with_*` setters, or read from a device-tree node
//! (see [`Config::from_device_tree`]).

use core::fmt;
use core::time::Duration;

use crate::drivers::gpio::Polarity;
use crate::drivers::net::ethernet::wiznet::regs::RTR_DEFAULT;

/// Default bound on bring-up polls and the TX gate wait.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Force the PHY to 100BASE-TX full duplex instead of auto-negotiating
    pub full_duplex: bool,
    /// Let socket 0 receive only own-address, broadcast and multicast frames
    pub mac_filter: bool,
    pub timeout: Duration,
    /// RTR value in 100 us units
    pub retry_time: u16,
    /// Board GPIO number of INTn. Board code uses it to build the
    /// `InterruptLine` it passes to `W5100::new`.
    pub interrupt_pin: Option<u32>,
    /// Board GPIO number of RSTn, for the pin handed to `W5100::with_reset_pin`
    pub reset_pin: Option<u32>,
    /// RSTn polarity; applied by `W5100::with_reset_pin`
    pub reset_active_low: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            full_duplex: false,
            mac_filter: true,
            timeout: DEFAULT_TIMEOUT,
            retry_time: RTR_DEFAULT,
            interrupt_pin: None,
            reset_pin: None,
            reset_active_low: true,
        }
    }
}

impl Config {
    pub fn with_full_duplex(mut self, full_duplex: bool) -> Self {
        self.full_duplex = full_duplex;
        self
    }

    pub fn with_mac_filter(mut self, mac_filter: bool) -> Self {
        self.mac_filter = mac_filter;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry_time(mut self, retry_time: u16) -> Self {
        self.retry_time = retry_time;
        self
    }

    pub fn with_interrupt_pin(mut self, pin: u32) -> Self {
        self.interrupt_pin = Some(pin);
        self
    }

    pub fn with_reset_pin(mut self, pin: u32, active_low: bool) -> Self {
        self.reset_pin = Some(pin);
        self.reset_active_low = active_low;
        self
    }

    pub fn reset_polarity(&self) -> Polarity {
        if self.reset_active_low {
            Polarity::ActiveLow
        } else {
            Polarity::ActiveHigh
        }
    }

    /// Reject values the chip or the driver cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout.is_zero() {
            return Err(ConfigError::InvalidValue("timeout"));
        }
        if self.retry_time == 0 {
            return Err(ConfigError::InvalidValue("retry-time"));
        }
        Ok(())
    }
}

/// Configuration loading or validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// Blob is not a flattened device tree
    BadMagic,
    /// Blob is truncated or structurally broken
    Malformed,
    /// No node compatible with the driver
    NodeNotFound,
    /// Property present but unreadable
    InvalidProperty(&'static str),
    /// Value out of range
    InvalidValue(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::BadMagic => write!(f, "Invalid DTB magic number"),
            ConfigError::Malformed => write!(f, "Malformed device tree"),
            ConfigError::NodeNotFound => write!(f, "No compatible device tree node"),
            ConfigError::InvalidProperty(name) => write!(f, "Invalid property '{}'", name),
            ConfigError::InvalidValue(name) => write!(f, "Invalid value for '{}'", name),
        }
    }
}

impl std::error::Error for ConfigError {}
