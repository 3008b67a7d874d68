//! Serial bus transaction primitive.
//!
//! The driver talks to the chip exclusively through [`Bus::transceive`]: one
//! synchronous, ordered transfer at a 16-bit chip address. [`SpiBus`] is the
//! stock implementation on top of embedded-hal blocking SPI plus a manually
//! driven chip-select pin.
//!
//! ## W5100 SPI framing
//!
//! Every byte moves in its own 32-bit frame, with chip select toggled around
//! each frame (W5100 datasheet section 6.3.2):
//!
//! ```text
//! +--------+---------+---------+--------+
//! | opcode | addr hi | addr lo |  data  |
//! +--------+---------+---------+--------+
//!   0xF0 = write, 0x0F = read (data returned in the 4th byte)
//! ```

use core::fmt;

use embedded_hal::blocking::spi::Transfer;
use embedded_hal::digital::v2::OutputPin;

/// One bus transfer at a chip address.
#[derive(Debug)]
pub enum Transaction<'a> {
    /// Fill the buffer from consecutive chip addresses.
    Read(&'a mut [u8]),
    /// Store the bytes at consecutive chip addresses.
    Write(&'a [u8]),
}

impl Transaction<'_> {
    pub fn len(&self) -> usize {
        match self {
            Transaction::Read(buf) => buf.len(),
            Transaction::Write(data) => data.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Synchronous register-level access to the chip.
///
/// Implementations need not be reentrant; the driver serializes all calls.
pub trait Bus: Send {
    type Error: fmt::Debug;

    /// Perform one transfer starting at `addr`. Addresses wrap at 16 bits.
    fn transceive(&mut self, addr: u16, transaction: Transaction<'_>) -> Result<(), Self::Error>;
}

/// A single 4-byte W5100 SPI frame.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpiFrame([u8; 4]);

impl SpiFrame {
    pub const OP_WRITE: u8 = 0xF0;
    pub const OP_READ: u8 = 0x0F;

    pub const fn write(addr: u16, data: u8) -> Self {
        let [hi, lo] = addr.to_be_bytes();
        Self([Self::OP_WRITE, hi, lo, data])
    }

    pub const fn read(addr: u16) -> Self {
        let [hi, lo] = addr.to_be_bytes();
        Self([Self::OP_READ, hi, lo, 0])
    }

    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

/// Failure of the underlying SPI peripheral or chip-select pin.
#[derive(Debug)]
pub enum SpiError<S, P> {
    Transfer(S),
    ChipSelect(P),
}

/// [`Bus`] over an embedded-hal SPI peripheral with a dedicated CS pin.
pub struct SpiBus<SPI, CS> {
    spi: SPI,
    cs: CS,
}

impl<SPI, CS> SpiBus<SPI, CS>
where
    SPI: Transfer<u8>,
    CS: OutputPin,
{
    /// Wrap `spi`; `cs` is driven high (idle) immediately.
    pub fn new(spi: SPI, mut cs: CS) -> Result<Self, SpiError<SPI::Error, CS::Error>> {
        cs.set_high().map_err(SpiError::ChipSelect)?;
        Ok(Self { spi, cs })
    }

    pub fn release(self) -> (SPI, CS) {
        (self.spi, self.cs)
    }

    /// Clock one frame with CS asserted; returns the byte shifted in last.
    fn exchange(&mut self, frame: SpiFrame) -> Result<u8, SpiError<SPI::Error, CS::Error>> {
        let mut words = frame.0;
        self.cs.set_low().map_err(SpiError::ChipSelect)?;
        let result = self.spi.transfer(&mut words).map(|received| received[3]);
        // CS must be released even when the transfer failed.
        self.cs.set_high().map_err(SpiError::ChipSelect)?;
        result.map_err(SpiError::Transfer)
    }
}

impl<SPI, CS> Bus for SpiBus<SPI, CS>
where
    SPI: Transfer<u8> + Send,
    SPI::Error: fmt::Debug,
    CS: OutputPin + Send,
    CS::Error: fmt::Debug,
{
    type Error = SpiError<SPI::Error, CS::Error>;

    fn transceive(&mut self, addr: u16, transaction: Transaction<'_>) -> Result<(), Self::Error> {
        match transaction {
            Transaction::Read(buf) => {
                for (i, byte) in buf.iter_mut().enumerate() {
                    *byte = self.exchange(SpiFrame::read(addr.wrapping_add(i as u16)))?;
                }
            }
            Transaction::Write(data) => {
                for (i, &byte) in data.iter().enumerate() {
                    self.exchange(SpiFrame::write(addr.wrapping_add(i as u16), byte))?;
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
