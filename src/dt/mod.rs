//! Device Tree Parsing
//!
//! Reads the driver configuration from a Flattened Device Tree (FDT/DTB).
//! The first node compatible with `wiznet,w5100` is used:
//!
//! ```dts
//! ethernet@0 {
//!     compatible = "wiznet,w5100";
//!     reg = <0>;
//!     spi-max-frequency = <14000000>;
//!     int-gpios = <&gpio 25 GPIO_ACTIVE_LOW>;
//!     reset-gpios = <&gpio 24 GPIO_ACTIVE_LOW>;
//!     full-duplex;
//!     timeout = <1000>;
//!     wiznet,retry-time = <2000>;
//!     wiznet,mac-filter = <1>;
//! };
//! ```
//!
//! Every property is optional; missing ones keep the [`Config`] default.
//!
//! # References
//!
//! - [Devicetree Specification](https://devicetree-specification.readthedocs.io/)
//! - Linux: Documentation/devicetree/bindings/net/wiznet,w5x00.yaml

use core::time::Duration;

use fdt_rs::base::DevTree;
use fdt_rs::prelude::*;
use log::debug;

use crate::config::{Config, ConfigError};

/// Compatible string of the W5100 node
pub const COMPATIBLE: &str = "wiznet,w5100";

const FDT_MAGIC: u32 = 0xd00d_feed;

/// FDT header size (version 17)
const FDT_HEADER_SIZE: usize = 40;

/// `flags` cell bit for an active-low GPIO
const GPIO_ACTIVE_LOW: u32 = 1;

/// Parsed view of a device tree blob.
pub struct HardwareInfo<'a> {
    blob: &'a [u8],
}

impl<'a> HardwareInfo<'a> {
    /// Validate the header of `blob`.
    ///
    /// # Errors
    ///
    /// - `BadMagic` - Magic number is not 0xd00dfeed
    /// - `Malformed` - Blob shorter than its header or its declared size
    pub fn from_blob(blob: &'a [u8]) -> Result<Self, ConfigError> {
        if blob.len() < FDT_HEADER_SIZE {
            return Err(ConfigError::Malformed);
        }

        let magic = u32::from_be_bytes([blob[0], blob[1], blob[2], blob[3]]);
        if magic != FDT_MAGIC {
            return Err(ConfigError::BadMagic);
        }

        // SAFETY: the slice covers a whole FDT header (length checked above)
        let size = unsafe { DevTree::read_totalsize(blob) }.map_err(|_| ConfigError::Malformed)?;
        if size > blob.len() {
            return Err(ConfigError::Malformed);
        }

        Ok(Self { blob: &blob[..size] })
    }

    /// Get size of DTB in bytes
    pub fn size(&self) -> usize {
        self.blob.len()
    }

    /// Find a device by compatible string
    ///
    /// Returns `Ok(None)` if no node matches.
    pub fn find_device(&self, compatible: &str) -> Result<Option<DeviceNode>, ConfigError> {
        // SAFETY: header and size were validated in from_blob
        let dt = unsafe { DevTree::new(self.blob) }.map_err(|_| ConfigError::Malformed)?;

        let mut compatible_iter = dt.compatible_nodes(compatible);
        let node = match compatible_iter.next() {
            Ok(Some(n)) => n,
            Ok(None) => return Ok(None),
            Err(_) => return Err(ConfigError::Malformed),
        };

        let mut device = DeviceNode {
            name: node.name().unwrap_or(compatible).into(),
            ..DeviceNode::default()
        };

        let mut props = node.props();
        while let Ok(Some(prop)) = props.next() {
            let Ok(name) = prop.name() else {
                continue;
            };
            match name {
                "full-duplex" => device.full_duplex = true,
                "timeout" => device.timeout_ms = Some(Self::read_u32(&prop, 0, "timeout")?),
                "wiznet,retry-time" => {
                    device.retry_time = Some(Self::read_u32(&prop, 0, "wiznet,retry-time")?)
                }
                "wiznet,mac-filter" => {
                    // Bare property means enabled
                    device.mac_filter = Some(
                        prop.length() == 0 || Self::read_u32(&prop, 0, "wiznet,mac-filter")? != 0,
                    )
                }
                "int-gpios" => device.interrupt = Some(Self::read_gpio(&prop, "int-gpios")?),
                "reset-gpios" => device.reset = Some(Self::read_gpio(&prop, "reset-gpios")?),
                _ => {}
            }
        }

        Ok(Some(device))
    }

    fn read_u32(
        prop: &fdt_rs::base::DevTreeProp,
        index: usize,
        name: &'static str,
    ) -> Result<u32, ConfigError> {
        prop.u32(index).map_err(|_| ConfigError::InvalidProperty(name))
    }

    /// Decode `<&controller pin flags>`.
    fn read_gpio(
        prop: &fdt_rs::base::DevTreeProp,
        name: &'static str,
    ) -> Result<GpioSpec, ConfigError> {
        if prop.length() < 12 {
            return Err(ConfigError::InvalidProperty(name));
        }
        Ok(GpioSpec {
            pin: Self::read_u32(prop, 1, name)?,
            active_low: Self::read_u32(prop, 2, name)? & GPIO_ACTIVE_LOW != 0,
        })
    }
}

/// A `*-gpios` specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GpioSpec {
    pub pin: u32,
    pub active_low: bool,
}

/// Driver-relevant properties of one device tree node
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeviceNode {
    name: String,
    pub full_duplex: bool,
    pub timeout_ms: Option<u32>,
    pub retry_time: Option<u32>,
    pub mac_filter: Option<bool>,
    pub interrupt: Option<GpioSpec>,
    pub reset: Option<GpioSpec>,
}

impl DeviceNode {
    /// Get node name (e.g., "ethernet@0")
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Overlay the node's properties on the default configuration.
    pub fn to_config(&self) -> Result<Config, ConfigError> {
        let mut config = Config::default().with_full_duplex(self.full_duplex);

        if let Some(ms) = self.timeout_ms {
            config = config.with_timeout(Duration::from_millis(ms as u64));
        }
        if let Some(retry) = self.retry_time {
            let retry = u16::try_from(retry).map_err(|_| ConfigError::InvalidValue("wiznet,retry-time"))?;
            config = config.with_retry_time(retry);
        }
        if let Some(filter) = self.mac_filter {
            config = config.with_mac_filter(filter);
        }
        if let Some(irq) = self.interrupt {
            config = config.with_interrupt_pin(irq.pin);
        }
        if let Some(reset) = self.reset {
            config = config.with_reset_pin(reset.pin, reset.active_low);
        }

        config.validate()?;
        Ok(config)
    }
}

impl Config {
    /// Load the configuration from the first `wiznet,w5100` node in `blob`.
    pub fn from_device_tree(blob: &[u8]) -> Result<Config, ConfigError> {
        let hw = HardwareInfo::from_blob(blob)?;
        let node = hw.find_device(COMPATIBLE)?.ok_or(ConfigError::NodeNotFound)?;
        debug!("[W5100] Using device tree node {}", node.name());
        node.to_config()
    }
}
