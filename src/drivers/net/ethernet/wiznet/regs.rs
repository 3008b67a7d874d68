//! W5100 register map.
//!
//! Source: W5100 datasheet v1.2.7 sections 3 and 4, W5100S datasheet for the
//! PHY registers. All multi-byte registers are big-endian.

use bitflags::bitflags;

// ============================================================================
// Common Registers
// ============================================================================

/// Mode register
pub const MR: u16 = 0x0000;
/// Gateway address (4 bytes)
pub const GAR: u16 = 0x0001;
/// Source hardware address (6 bytes)
pub const SHAR: u16 = 0x0009;
/// Interrupt register
pub const IR: u16 = 0x0015;
/// Interrupt mask register
pub const IMR: u16 = 0x0016;
/// Retry time, 100 us units (2 bytes)
pub const RTR: u16 = 0x0017;
/// PHY status (W5100S)
pub const PHYSR: u16 = 0x003C;
/// PHY control 0 (W5100S)
pub const PHYCR0: u16 = 0x0046;

bitflags! {
    /// MR bits
    pub struct Mode: u8 {
        /// Software reset, self-clearing
        const RST = 0x80;
        /// Ping block
        const PB = 0x10;
        /// Address auto-increment (indirect bus mode)
        const AI = 0x02;
        /// Indirect bus mode
        const IND = 0x01;
    }
}

bitflags! {
    /// IR / IMR bits
    pub struct Interrupt: u8 {
        /// Socket 0 event pending
        const S0 = 0x01;
    }
}

/// PHYSR: link up
pub const PHYSR_LNK: u8 = 0x01;
/// PHYCR0: force 100BASE-TX full duplex, auto-negotiation off
pub const PHYCR0_100_FDX: u8 = 0x04;

/// Default retry time (200 ms)
pub const RTR_DEFAULT: u16 = 2000;

// ============================================================================
// Socket Registers
// ============================================================================

/// Socket register block stride
pub const SOCKET_STRIDE: u16 = 0x0100;
/// Socket 0 register base
pub const S0_BASE: u16 = 0x0400;

/// Number of hardware sockets
pub const SOCKET_COUNT: u16 = 4;

/// Sn_MR: socket mode
pub const SN_MR: u16 = 0x00;
/// Sn_CR: socket command, reads back 0 once accepted
pub const SN_CR: u16 = 0x01;
/// Sn_IR: socket interrupt, write-1-to-clear
pub const SN_IR: u16 = 0x02;
/// Sn_SR: socket status
pub const SN_SR: u16 = 0x03;
/// Sn_RXMEM_SIZE: RX buffer size in KiB
pub const SN_RXMEM_SIZE: u16 = 0x1E;
/// Sn_TXMEM_SIZE: TX buffer size in KiB
pub const SN_TXMEM_SIZE: u16 = 0x1F;
/// Sn_TX_FSR: free bytes in TX ring (2 bytes)
pub const SN_TX_FSR: u16 = 0x20;
/// Sn_TX_RD: TX read pointer (2 bytes)
pub const SN_TX_RD: u16 = 0x22;
/// Sn_TX_WR: TX write pointer (2 bytes)
pub const SN_TX_WR: u16 = 0x24;
/// Sn_RX_RSR: received bytes in RX ring (2 bytes)
pub const SN_RX_RSR: u16 = 0x26;
/// Sn_RX_RD: RX read pointer (2 bytes)
pub const SN_RX_RD: u16 = 0x28;
/// Sn_IMR: socket interrupt mask (W5100S)
pub const SN_IMR: u16 = 0x2C;

/// Absolute address of socket `n`'s register at `offset`.
pub const fn socket_reg(n: u16, offset: u16) -> u16 {
    S0_BASE + n * SOCKET_STRIDE + offset
}

pub const S0_MR: u16 = socket_reg(0, SN_MR);
pub const S0_CR: u16 = socket_reg(0, SN_CR);
pub const S0_IR: u16 = socket_reg(0, SN_IR);
pub const S0_SR: u16 = socket_reg(0, SN_SR);
pub const S0_TX_FSR: u16 = socket_reg(0, SN_TX_FSR);
pub const S0_TX_RD: u16 = socket_reg(0, SN_TX_RD);
pub const S0_TX_WR: u16 = socket_reg(0, SN_TX_WR);
pub const S0_RX_RSR: u16 = socket_reg(0, SN_RX_RSR);
pub const S0_RX_RD: u16 = socket_reg(0, SN_RX_RD);
pub const S0_IMR: u16 = socket_reg(0, SN_IMR);

bitflags! {
    /// Sn_MR bits
    pub struct SocketMode: u8 {
        /// Raw Ethernet frames
        const MACRAW = 0x04;
        /// MAC filter: only own, broadcast and multicast frames
        const MF = 0x40;
    }
}

bitflags! {
    /// Sn_IR / Sn_IMR bits
    pub struct SocketInterrupt: u8 {
        const SEND_OK = 0x10;
        const TIMEOUT = 0x08;
        const RECV = 0x04;
        const DISCON = 0x02;
        const CON = 0x01;
    }
}

/// Sn_CR commands
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Open = 0x01,
    Close = 0x10,
    Send = 0x20,
    Recv = 0x40,
}

/// Sn_SR: socket closed
pub const SR_CLOSED: u8 = 0x00;
/// Sn_SR: socket open in MACRAW mode
pub const SR_MACRAW: u8 = 0x42;

// ============================================================================
// Buffer Memory
// ============================================================================

/// TX memory base
pub const TX_BASE: u16 = 0x4000;
/// TX memory size (all of it assigned to socket 0)
pub const TX_SIZE: u16 = 0x2000;
/// RX memory base
pub const RX_BASE: u16 = 0x6000;
/// RX memory size (all of it assigned to socket 0)
pub const RX_SIZE: u16 = 0x2000;

/// Size of the length header the chip prepends to every MACRAW frame
pub const RX_HEADER_LEN: usize = 2;

/// PHY register access delay (25.6 us, rounded up)
pub const PHY_ACCESS_DELAY_US: u64 = 26;
