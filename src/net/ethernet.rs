//! Ethernet addressing.
//!
//! MAC addresses, the MAC source handed to the driver, and a header view
//! for RX logging.

use core::fmt;
use core::str::FromStr;

/// Largest frame moved through the driver in either direction.
///
/// 14-byte header + 1500-byte payload + 4-byte VLAN tag; the chip strips
/// and appends the FCS itself.
pub const MAX_FRAME_SIZE: usize = 1518;

/// WIZnet organizationally unique identifier.
pub const WIZNET_OUI: [u8; 3] = [0x00, 0x08, 0xDC];

/// Station address programmed into SHAR.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct MacAddress(pub [u8; 6]);

impl MacAddress {
    pub const fn new(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    pub const fn broadcast() -> Self {
        Self([0xFF; 6])
    }

    pub const fn zero() -> Self {
        Self([0x00; 6])
    }

    /// Address under the WIZnet OUI with a caller-chosen device suffix.
    pub const fn wiznet(suffix: [u8; 3]) -> Self {
        let [a, b, c] = WIZNET_OUI;
        Self([a, b, c, suffix[0], suffix[1], suffix[2]])
    }

    /// Locally administered unicast address built from 5 bytes of entropy.
    ///
    /// The first octet is 0x02: U/L bit set, I/G bit clear.
    pub const fn locally_administered(entropy: [u8; 5]) -> Self {
        let [a, b, c, d, e] = entropy;
        Self([0x02, a, b, c, d, e])
    }

    pub fn is_broadcast(&self) -> bool {
        self.0.iter().all(|&b| b == 0xFF)
    }

    /// I/G bit of the first octet
    pub fn is_multicast(&self) -> bool {
        self.0[0] & 0x01 == 0x01
    }

    pub fn is_unicast(&self) -> bool {
        !self.is_multicast()
    }

    /// U/L bit of the first octet
    pub fn is_locally_administered(&self) -> bool {
        self.0[0] & 0x02 == 0x02
    }

    /// Usable as the chip's source address: unicast and not all-zero.
    pub fn is_valid_source(&self) -> bool {
        self.is_unicast() && self.0.iter().any(|&b| b != 0)
    }

    pub const fn as_bytes(&self) -> &[u8; 6] {
        &self.0
    }
}

/// `MacAddress` string was not six colon-separated hex octets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParseMacError;

impl fmt::Display for ParseMacError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("expected six colon-separated hex octets")
    }
}

impl std::error::Error for ParseMacError {}

/// Accepts `00:08:DC:12:34:56`, either case.
impl FromStr for MacAddress {
    type Err = ParseMacError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut octets = [0u8; 6];
        let mut fields = s.split(':');
        for octet in &mut octets {
            let field = fields.next().filter(|f| f.len() == 2).ok_or(ParseMacError)?;
            *octet = u8::from_str_radix(field, 16).map_err(|_| ParseMacError)?;
        }
        match fields.next() {
            Some(_) => Err(ParseMacError),
            None => Ok(Self(octets)),
        }
    }
}

impl fmt::Display for MacAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, octet) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(":")?;
            }
            write!(f, "{:02X}", octet)?;
        }
        Ok(())
    }
}

/// Where the driver gets its MAC address at bring-up.
pub enum MacSource {
    /// Device-specific address (board config, EEPROM, device tree).
    Fixed(MacAddress),
    /// Called exactly once during initialization.
    Generator(Box<dyn FnMut() -> MacAddress + Send>),
}

impl MacSource {
    pub fn generator<F>(f: F) -> Self
    where
        F: FnMut() -> MacAddress + Send + 'static,
    {
        MacSource::Generator(Box::new(f))
    }

    /// Produce the address. Runs the generator, if any.
    pub fn resolve(&mut self) -> MacAddress {
        match self {
            MacSource::Fixed(mac) => *mac,
            MacSource::Generator(generate) => generate(),
        }
    }
}

impl fmt::Debug for MacSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacSource::Fixed(mac) => f.debug_tuple("Fixed").field(mac).finish(),
            MacSource::Generator(_) => f.write_str("Generator(..)"),
        }
    }
}

/// Ethernet II header at the front of a received frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub destination: MacAddress,
    pub source: MacAddress,
    pub ethertype: u16,
}

impl FrameHeader {
    pub const LEN: usize = 14;

    /// Read the header of `frame`, or `None` for a runt.
    pub fn parse(frame: &[u8]) -> Option<Self> {
        let header: &[u8; Self::LEN] = frame.get(..Self::LEN)?.try_into().ok()?;
        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];
        destination.copy_from_slice(&header[..6]);
        source.copy_from_slice(&header[6..12]);
        Some(Self {
            destination: MacAddress(destination),
            source: MacAddress(source),
            ethertype: u16::from_be_bytes([header[12], header[13]]),
        })
    }
}
