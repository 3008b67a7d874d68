//! GPIO lines used by the driver: the chip reset line and the interrupt line.
//!
//! The reset line is an ordinary output pin (any embedded-hal `OutputPin`)
//! with a board-specific polarity. The interrupt line is abstracted by
//! [`InterruptLine`] because edge-callback registration is platform-specific
//! and has no embedded-hal equivalent.
//!
//! **IMPORTANT**: callbacks registered through [`InterruptLine::enable`] may
//! run in interrupt context. They must not block and must not touch the SPI
//! bus.

use core::fmt;
use std::time::Duration;

use embedded_hal::digital::v2::OutputPin;

use crate::drivers::timer::SystemTimer;

/// Callback invoked on every qualifying edge of the interrupt line.
pub type IrqCallback = Box<dyn Fn() + Send + Sync + 'static>;

/// Signal edge that triggers the interrupt callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

/// Electrical polarity of an output line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Polarity {
    /// Asserted when driven low (W5100 RSTn).
    ActiveLow,
    /// Asserted when driven high.
    ActiveHigh,
}

/// GPIO operation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GpioError {
    /// Driving an output pin failed.
    Output,
    /// Registering or removing an edge callback failed.
    Interrupt,
}

impl fmt::Display for GpioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GpioError::Output => write!(f, "GPIO output failed"),
            GpioError::Interrupt => write!(f, "GPIO interrupt configuration failed"),
        }
    }
}

/// Edge-triggered input line with a single registered callback.
pub trait InterruptLine: Send {
    /// Arm the line; `callback` runs on every `edge` until [`disable`](Self::disable).
    ///
    /// Re-enabling replaces the previous callback.
    fn enable(&mut self, edge: Edge, callback: IrqCallback) -> Result<(), GpioError>;

    /// Disarm the line and drop the callback.
    fn disable(&mut self) -> Result<(), GpioError>;
}

/// Something that can hold the chip in reset.
pub trait ResetControl: Send {
    /// Drive the line to its asserted (`true`) or released (`false`) level.
    fn set_asserted(&mut self, asserted: bool) -> Result<(), GpioError>;

    /// Assert for `hold`, release, then wait `settle` before returning.
    fn pulse(&mut self, hold: Duration, settle: Duration) -> Result<(), GpioError> {
        self.set_asserted(true)?;
        SystemTimer::delay_us(hold.as_micros() as u64);
        self.set_asserted(false)?;
        SystemTimer::delay_us(settle.as_micros() as u64);
        Ok(())
    }
}

/// Reset line backed by an embedded-hal output pin.
pub struct ResetLine<P> {
    pin: P,
    polarity: Polarity,
}

impl<P: OutputPin> ResetLine<P> {
    pub fn new(pin: P, polarity: Polarity) -> Self {
        Self { pin, polarity }
    }

    /// Give the pin back.
    pub fn release(self) -> P {
        self.pin
    }
}

impl<P> ResetControl for ResetLine<P>
where
    P: OutputPin + Send,
{
    fn set_asserted(&mut self, asserted: bool) -> Result<(), GpioError> {
        let drive_high = match self.polarity {
            Polarity::ActiveLow => !asserted,
            Polarity::ActiveHigh => asserted,
        };

        if drive_high {
            self.pin.set_high().map_err(|_| GpioError::Output)
        } else {
            self.pin.set_low().map_err(|_| GpioError::Output)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
