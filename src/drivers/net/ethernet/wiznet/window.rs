//! Ring buffer memory windows.
//!
//! The chip exposes each ring as a fixed window of its address space. The
//! driver keeps free-running 16-bit logical pointers (exactly what Sn_TX_WR
//! and Sn_RX_RD hold) and masks them into the window on every access.
//!
//! ```text
//!   base                               base + size
//!    |-------------------------------------|
//!    |  ....tail]              [head.....  |
//!    |-------------------------------------|
//!              an access that crosses the end
//!              splits into [head] then [tail]
//! ```

use super::regs::{RX_BASE, RX_SIZE, TX_BASE, TX_SIZE};

/// A contiguous run of chip addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub addr: u16,
    pub len: usize,
}

/// A power-of-two sized ring window at a fixed chip address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryWindow {
    base: u16,
    size: u16,
}

pub const TX_WINDOW: MemoryWindow = MemoryWindow::new(TX_BASE, TX_SIZE);
pub const RX_WINDOW: MemoryWindow = MemoryWindow::new(RX_BASE, RX_SIZE);

impl MemoryWindow {
    pub const fn new(base: u16, size: u16) -> Self {
        assert!(size.is_power_of_two(), "window size must be a power of two");
        Self { base, size }
    }

    pub const fn base(&self) -> u16 {
        self.base
    }

    pub const fn size(&self) -> u16 {
        self.size
    }

    /// Ring offset of a logical pointer.
    #[inline]
    pub const fn offset(&self, pointer: u16) -> u16 {
        pointer & (self.size - 1)
    }

    /// Absolute chip address of a logical pointer.
    #[inline]
    pub const fn map(&self, pointer: u16) -> u16 {
        self.base + self.offset(pointer)
    }

    /// Split an access of `len` bytes starting at `pointer`.
    ///
    /// `len` must not exceed the window size; callers check this against the
    /// free/available counts first.
    pub fn segments(&self, pointer: u16, len: usize) -> (Segment, Option<Segment>) {
        let offset = self.offset(pointer) as usize;
        let until_end = self.size as usize - offset;

        if len <= until_end {
            return (
                Segment {
                    addr: self.map(pointer),
                    len,
                },
                None,
            );
        }

        (
            Segment {
                addr: self.map(pointer),
                len: until_end,
            },
            Some(Segment {
                addr: self.base,
                len: len - until_end,
            }),
        )
    }
}

/// Chip address of TX ring pointer `offset`.
#[inline]
pub const fn map_tx(offset: u16) -> u16 {
    TX_WINDOW.map(offset)
}

/// Chip address of RX ring pointer `offset`.
#[inline]
pub const fn map_rx(offset: u16) -> u16 {
    RX_WINDOW.map(offset)
}
