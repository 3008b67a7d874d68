//! Simulated W5100 for host tests.
//!
//! Models the register file, both rings, socket commands, write-1-to-clear
//! Sn_IR and the INTn line. [`MockChip`] is the test's handle; the driver
//! gets a [`MockBus`] and a [`MockIrq`] that share its state.
//!
//! INTn is a level: low while IMR enables socket 0 and `Sn_IR & Sn_IMR` is
//! non-zero. The callback runs only on the high-to-low transition, so an
//! event that lands while the line is already low produces no edge. The
//! callback always runs after the chip state lock is released.

use std::sync::{Arc, Mutex, MutexGuard};

use super::regs::*;
use crate::drivers::gpio::{Edge, GpioError, InterruptLine, IrqCallback};
use crate::drivers::spi::{Bus, Transaction};

#[derive(Debug)]
pub(crate) struct MockFault;

struct ChipState {
    mem: Vec<u8>,
    /// Hardware-owned TX read pointer
    tx_rd: u16,
    /// Hardware-owned RX write pointer
    rx_wr: u16,
    tx_free_override: Option<u16>,
    open_fails: bool,
    commands_stick: bool,
    reset_sticks: bool,
    bus_fails: bool,
    auto_sendok: bool,
    commands: Vec<u8>,
    write_log: Vec<(u16, u8)>,
    sent: Vec<Vec<u8>>,
    in_flight: usize,
    max_in_flight: usize,
    /// Current INTn level
    line_low: bool,
}

impl ChipState {
    fn new() -> Self {
        Self {
            mem: vec![0; 0x10000],
            tx_rd: 0,
            rx_wr: 0,
            tx_free_override: None,
            open_fails: false,
            commands_stick: false,
            reset_sticks: false,
            bus_fails: false,
            auto_sendok: true,
            commands: Vec::new(),
            write_log: Vec::new(),
            sent: Vec::new(),
            in_flight: 0,
            max_in_flight: 0,
            line_low: false,
        }
    }

    fn raw_u16(&self, addr: u16) -> u16 {
        u16::from_be_bytes([self.mem[addr as usize], self.mem[addr as usize + 1]])
    }

    fn set_raw_u16(&mut self, addr: u16, value: u16) {
        let [hi, lo] = value.to_be_bytes();
        self.mem[addr as usize] = hi;
        self.mem[addr as usize + 1] = lo;
    }

    fn tx_free(&self) -> u16 {
        self.tx_free_override
            .unwrap_or_else(|| TX_SIZE - self.raw_u16(S0_TX_WR).wrapping_sub(self.tx_rd))
    }

    fn rx_pending(&self) -> u16 {
        self.rx_wr.wrapping_sub(self.raw_u16(S0_RX_RD))
    }

    fn read_byte(&self, addr: u16) -> u8 {
        let derived = |base: u16, value: u16| value.to_be_bytes()[(addr - base) as usize];
        if addr == S0_TX_FSR || addr == S0_TX_FSR + 1 {
            derived(S0_TX_FSR, self.tx_free())
        } else if addr == S0_TX_RD || addr == S0_TX_RD + 1 {
            derived(S0_TX_RD, self.tx_rd)
        } else if addr == S0_RX_RSR || addr == S0_RX_RSR + 1 {
            derived(S0_RX_RSR, self.rx_pending())
        } else {
            self.mem[addr as usize]
        }
    }

    /// Recompute INTn. Returns true on a falling edge.
    fn sync_line(&mut self) -> bool {
        let enabled = self.mem[IMR as usize] & Interrupt::S0.bits() != 0;
        let pending = self.mem[S0_IR as usize] & self.mem[S0_IMR as usize] != 0;
        let low = enabled && pending;
        let fell = low && !self.line_low;
        self.line_low = low;
        fell
    }

    fn write_byte(&mut self, addr: u16, value: u8) {
        self.write_log.push((addr, value));
        match addr {
            MR => {
                let mode = if self.reset_sticks {
                    value
                } else {
                    value & !Mode::RST.bits()
                };
                self.mem[MR as usize] = mode;
            }
            S0_CR => self.execute(value),
            S0_IR => {
                if value & SocketInterrupt::SEND_OK.bits() != 0
                    && self.mem[S0_IR as usize] & SocketInterrupt::SEND_OK.bits() != 0
                {
                    self.in_flight = self.in_flight.saturating_sub(1);
                }
                self.mem[S0_IR as usize] &= !value;
            }
            _ => {
                self.mem[addr as usize] = value;
            }
        }
    }

    fn execute(&mut self, command: u8) {
        self.commands.push(command);
        if self.commands_stick {
            self.mem[S0_CR as usize] = command;
            return;
        }
        self.mem[S0_CR as usize] = 0;

        match command {
            c if c == Command::Open as u8 => {
                let macraw = self.mem[S0_MR as usize] & SocketMode::MACRAW.bits() != 0;
                if macraw && !self.open_fails {
                    self.mem[S0_SR as usize] = SR_MACRAW;
                }
            }
            c if c == Command::Close as u8 => {
                self.mem[S0_SR as usize] = SR_CLOSED;
            }
            c if c == Command::Send as u8 => {
                let wr = self.raw_u16(S0_TX_WR);
                let len = wr.wrapping_sub(self.tx_rd);
                let frame = (0..len)
                    .map(|i| self.mem[(TX_BASE + (self.tx_rd.wrapping_add(i) & (TX_SIZE - 1))) as usize])
                    .collect();
                self.sent.push(frame);
                self.tx_rd = wr;
                self.in_flight += 1;
                self.max_in_flight = self.max_in_flight.max(self.in_flight);
                if self.auto_sendok {
                    self.mem[S0_IR as usize] |= SocketInterrupt::SEND_OK.bits();
                }
            }
            _ => {}
        }
    }

    fn push_rx(&mut self, bytes: &[u8]) {
        for &byte in bytes {
            let addr = RX_BASE + (self.rx_wr & (RX_SIZE - 1));
            self.mem[addr as usize] = byte;
            self.rx_wr = self.rx_wr.wrapping_add(1);
        }
        self.mem[S0_IR as usize] |= SocketInterrupt::RECV.bits();
    }

    fn push_frame(&mut self, frame: &[u8]) {
        let total = (frame.len() + RX_HEADER_LEN) as u16;
        self.push_rx(&total.to_be_bytes());
        self.push_rx(frame);
    }
}

#[derive(Default)]
struct IrqState {
    callback: Option<IrqCallback>,
    edge: Option<Edge>,
    /// Edges that reached a callback
    fired: usize,
    /// Edges with no callback attached
    unheard: usize,
}

#[derive(Clone)]
pub(crate) struct MockChip {
    state: Arc<Mutex<ChipState>>,
    irq: Arc<Mutex<IrqState>>,
}

pub(crate) struct MockBus {
    chip: MockChip,
}

pub(crate) struct MockIrq {
    chip: MockChip,
}

impl MockChip {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ChipState::new())),
            irq: Arc::new(Mutex::new(IrqState::default())),
        }
    }

    fn state(&self) -> MutexGuard<'_, ChipState> {
        self.state.lock().unwrap()
    }

    pub(crate) fn bus(&self) -> MockBus {
        MockBus { chip: self.clone() }
    }

    pub(crate) fn irq(&self) -> MockIrq {
        MockIrq { chip: self.clone() }
    }

    /// Deliver one falling edge to the callback, if any.
    pub(crate) fn fire_interrupt(&self) {
        let mut irq = self.irq.lock().unwrap();
        if let Some(callback) = irq.callback.as_ref() {
            callback();
            irq.fired += 1;
        } else {
            irq.unheard += 1;
        }
    }

    /// Apply `change` to the chip state, then edge INTn if it fell.
    fn update<R>(&self, change: impl FnOnce(&mut ChipState) -> R) -> R {
        let (result, fell) = {
            let mut state = self.state();
            let result = change(&mut state);
            (result, state.sync_line())
        };
        if fell {
            self.fire_interrupt();
        }
        result
    }

    pub(crate) fn edges_fired(&self) -> usize {
        self.irq.lock().unwrap().fired
    }

    pub(crate) fn edges_unheard(&self) -> usize {
        self.irq.lock().unwrap().unheard
    }

    pub(crate) fn line_asserted(&self) -> bool {
        self.state().line_low
    }

    pub(crate) fn irq_edge(&self) -> Option<Edge> {
        self.irq.lock().unwrap().edge
    }

    pub(crate) fn peek(&self, addr: u16) -> u8 {
        self.state().mem[addr as usize]
    }

    pub(crate) fn peek_u16(&self, addr: u16) -> u16 {
        self.state().raw_u16(addr)
    }

    pub(crate) fn peek_range(&self, addr: u16, len: usize) -> Vec<u8> {
        self.state().mem[addr as usize..addr as usize + len].to_vec()
    }

    /// Store bytes without register side effects.
    pub(crate) fn poke(&self, addr: u16, bytes: &[u8]) {
        self.state().mem[addr as usize..addr as usize + bytes.len()].copy_from_slice(bytes);
    }

    pub(crate) fn fill(&self, addr: u16, len: usize, value: u8) {
        self.state().mem[addr as usize..addr as usize + len].fill(value);
    }

    pub(crate) fn set_tx_pointers(&self, pointer: u16) {
        let mut state = self.state();
        state.set_raw_u16(S0_TX_WR, pointer);
        state.tx_rd = pointer;
    }

    pub(crate) fn set_rx_pointers(&self, pointer: u16) {
        let mut state = self.state();
        state.set_raw_u16(S0_RX_RD, pointer);
        state.rx_wr = pointer;
    }

    pub(crate) fn set_tx_free_override(&self, free: Option<u16>) {
        self.state().tx_free_override = free;
    }

    pub(crate) fn set_open_fails(&self, fails: bool) {
        self.state().open_fails = fails;
    }

    pub(crate) fn set_commands_stick(&self, stick: bool) {
        self.state().commands_stick = stick;
    }

    pub(crate) fn set_reset_sticks(&self, sticks: bool) {
        self.state().reset_sticks = sticks;
    }

    pub(crate) fn set_bus_fails(&self, fails: bool) {
        self.state().bus_fails = fails;
    }

    pub(crate) fn set_auto_sendok(&self, auto: bool) {
        self.state().auto_sendok = auto;
    }

    /// Report completion of the frame in flight.
    pub(crate) fn complete_send(&self) {
        self.update(|state| state.mem[S0_IR as usize] |= SocketInterrupt::SEND_OK.bits());
    }

    /// Report completion and queue frames, all behind one edge.
    pub(crate) fn complete_send_and_inject(&self, frames: &[&[u8]]) {
        self.update(|state| {
            state.mem[S0_IR as usize] |= SocketInterrupt::SEND_OK.bits();
            for frame in frames {
                state.push_frame(frame);
            }
        });
    }

    pub(crate) fn command_count(&self, command: Command) -> usize {
        self.state()
            .commands
            .iter()
            .filter(|&&c| c == command as u8)
            .count()
    }

    pub(crate) fn write_log(&self) -> Vec<(u16, u8)> {
        self.state().write_log.clone()
    }

    pub(crate) fn sent_frames(&self) -> Vec<Vec<u8>> {
        self.state().sent.clone()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.state().max_in_flight
    }

    pub(crate) fn rx_pending(&self) -> u16 {
        self.state().rx_pending()
    }

    /// Queue one received frame.
    pub(crate) fn inject_frame(&self, frame: &[u8]) {
        self.inject_frames(&[frame]);
    }

    /// Queue several frames at once; at most one INTn edge.
    pub(crate) fn inject_frames(&self, frames: &[&[u8]]) {
        self.update(|state| {
            for frame in frames {
                state.push_frame(frame);
            }
        });
    }

    /// Queue raw ring bytes, header included.
    pub(crate) fn inject_raw(&self, bytes: &[u8]) {
        self.update(|state| state.push_rx(bytes));
    }
}

impl Bus for MockBus {
    type Error = MockFault;

    fn transceive(&mut self, addr: u16, transaction: Transaction<'_>) -> Result<(), Self::Error> {
        let fire = {
            let mut state = self.chip.state();
            if state.bus_fails {
                return Err(MockFault);
            }
            match transaction {
                Transaction::Read(buf) => {
                    for (i, byte) in buf.iter_mut().enumerate() {
                        *byte = state.read_byte(addr.wrapping_add(i as u16));
                    }
                }
                Transaction::Write(data) => {
                    for (i, &byte) in data.iter().enumerate() {
                        state.write_byte(addr.wrapping_add(i as u16), byte);
                    }
                }
            }
            state.sync_line()
        };

        if fire {
            self.chip.fire_interrupt();
        }
        Ok(())
    }
}

impl InterruptLine for MockIrq {
    fn enable(&mut self, edge: Edge, callback: IrqCallback) -> Result<(), GpioError> {
        let mut irq = self.chip.irq.lock().unwrap();
        irq.callback = Some(callback);
        irq.edge = Some(edge);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), GpioError> {
        let mut irq = self.chip.irq.lock().unwrap();
        irq.callback = None;
        irq.edge = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_free_space_tracks_pointers() {
        let chip = MockChip::new();
        chip.set_tx_pointers(0xFFF0);
        chip.poke(S0_TX_WR, &0x0010u16.to_be_bytes());

        let mut bus = chip.bus();
        let mut fsr = [0u8; 2];
        bus.transceive(S0_TX_FSR, Transaction::Read(&mut fsr)).unwrap();
        assert_eq!(u16::from_be_bytes(fsr), TX_SIZE - 0x20);
    }

    #[test]
    fn test_interrupt_register_is_write_one_to_clear() {
        let chip = MockChip::new();
        chip.poke(S0_IR, &[0x14]);
        let mut bus = chip.bus();
        bus.transceive(S0_IR, Transaction::Write(&[0x04])).unwrap();
        assert_eq!(chip.peek(S0_IR), 0x10);
    }

    #[test]
    fn test_line_follows_masked_interrupt_level() {
        let chip = MockChip::new();
        let mut bus = chip.bus();

        // Masked: pending RECV does not pull the line
        chip.inject_frame(&[0u8; 60]);
        assert!(!chip.line_asserted());

        bus.transceive(S0_IMR, Transaction::Write(&[0x14])).unwrap();
        bus.transceive(IMR, Transaction::Write(&[0x01])).unwrap();
        assert!(chip.line_asserted());
        assert_eq!(chip.edges_unheard(), 1);

        // Second event while low: no new edge
        chip.inject_frame(&[0u8; 60]);
        assert_eq!(chip.edges_unheard(), 1);

        // Clearing Sn_IR releases the line, the next event edges again
        bus.transceive(S0_IR, Transaction::Write(&[0x04])).unwrap();
        assert!(!chip.line_asserted());
        chip.inject_frame(&[0u8; 60]);
        assert!(chip.line_asserted());
        assert_eq!(chip.edges_unheard(), 2);
    }
}
