//! Register access layer.
//!
//! Typed reads and writes on top of a [`Bus`]. Every method is a thin wrapper
//! around one or two bus transactions; none of them retries. A bus fault is
//! logged once here and surfaces as [`NetworkError::BusError`].
//!
//! Callers serialize access by owning `Registers` behind the driver's
//! register-space lock.

use log::error;

use super::window::MemoryWindow;
use crate::drivers::net::netdev::NetworkError;
use crate::drivers::spi::{Bus, Transaction};

pub struct Registers<B> {
    bus: B,
}

impl<B: Bus> Registers<B> {
    pub fn new(bus: B) -> Self {
        Self { bus }
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    pub fn into_bus(self) -> B {
        self.bus
    }

    /// Fill `buf` from consecutive addresses starting at `addr`.
    pub fn read(&mut self, addr: u16, buf: &mut [u8]) -> Result<(), NetworkError> {
        if buf.is_empty() {
            return Ok(());
        }
        let len = buf.len();
        self.bus
            .transceive(addr, Transaction::Read(buf))
            .map_err(|err| {
                error!("[W5100] Bus read of {} bytes at 0x{:04X} failed: {:?}", len, addr, err);
                NetworkError::BusError
            })
    }

    /// Store `bytes` at consecutive addresses starting at `addr`.
    pub fn write(&mut self, addr: u16, bytes: &[u8]) -> Result<(), NetworkError> {
        if bytes.is_empty() {
            return Ok(());
        }
        self.bus
            .transceive(addr, Transaction::Write(bytes))
            .map_err(|err| {
                error!(
                    "[W5100] Bus write of {} bytes at 0x{:04X} failed: {:?}",
                    bytes.len(),
                    addr,
                    err
                );
                NetworkError::BusError
            })
    }

    pub fn read_u8(&mut self, addr: u16) -> Result<u8, NetworkError> {
        let mut buf = [0u8; 1];
        self.read(addr, &mut buf)?;
        Ok(buf[0])
    }

    pub fn write_u8(&mut self, addr: u16, value: u8) -> Result<(), NetworkError> {
        self.write(addr, &[value])
    }

    /// Read a big-endian 16-bit register (high byte at `addr`).
    pub fn read_u16(&mut self, addr: u16) -> Result<u16, NetworkError> {
        let mut buf = [0u8; 2];
        self.read(addr, &mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// Write a big-endian 16-bit register (high byte at `addr`).
    pub fn write_u16(&mut self, addr: u16, value: u16) -> Result<(), NetworkError> {
        self.write(addr, &value.to_be_bytes())
    }

    /// Read `buf.len()` bytes from a ring starting at logical `pointer`.
    pub fn read_ring(
        &mut self,
        window: &MemoryWindow,
        pointer: u16,
        buf: &mut [u8],
    ) -> Result<(), NetworkError> {
        let (first, second) = window.segments(pointer, buf.len());
        let (head, tail) = buf.split_at_mut(first.len);
        self.read(first.addr, head)?;
        if let Some(second) = second {
            self.read(second.addr, tail)?;
        }
        Ok(())
    }

    /// Write `data` into a ring starting at logical `pointer`.
    pub fn write_ring(
        &mut self,
        window: &MemoryWindow,
        pointer: u16,
        data: &[u8],
    ) -> Result<(), NetworkError> {
        let (first, second) = window.segments(pointer, data.len());
        let (head, tail) = data.split_at(first.len);
        self.write(first.addr, head)?;
        if let Some(second) = second {
            self.write(second.addr, tail)?;
        }
        Ok(())
    }
}
