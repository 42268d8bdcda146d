//! Testing utilities and mock implementations
//!
//! This module provides a simulated KS8851 for testing the driver on the host
//! without hardware access.
//!
//! Only available when running `cargo test`.

// Note: The #[cfg(test)] attribute is applied in lib.rs where this module is declared
#![allow(missing_docs)]
#![allow(clippy::std_instead_of_core, clippy::std_instead_of_alloc)]

extern crate std;

use core::cell::{Cell, RefCell};
use std::rc::Rc;
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use crate::driver::device::{Timestamp, Uplink};
use crate::hal::spi::{SPIOP_RD, SPIOP_WR, SpiBus, decode_command};
use crate::internal::constants::align4;
use crate::internal::register::{
    CIDER, ISR, MBIR, RXFC, RXFHBCR, RXQCR, TXMIR, cider, mbir, rxqcr,
};
use crate::phy::LinkState;

// =============================================================================
// Mock Chip
// =============================================================================

/// Error returned by an injected bus fault
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockBusError;

#[derive(Debug)]
struct ChipModel {
    /// Byte-addressed register file, 16-bit registers little-endian
    regs: [u8; 256],
    /// Register writes: (address, value)
    write_log: Vec<(u8, u16)>,
    /// Replies for chained RXFHBCR reads
    rx_counts: Vec<u16>,
    /// Bytes queued in the RX FIFO, without the leading dummy word
    rx_stream: Vec<u8>,
    rx_cursor: usize,
    dummy_pending: bool,
    /// TX FIFO bursts as wire bytes
    tx_bursts: Vec<Vec<u8>>,
    chained_reads: usize,
    /// Register addresses read with 8-bit framing
    framed_reads: Vec<u8>,
    /// Register addresses read through the 32-bit fast path
    fast_reads: Vec<u8>,
    fifo_read_lens: Vec<usize>,
    fail_next: u32,
    fail_fifo_read: bool,
}

impl ChipModel {
    fn new() -> Self {
        Self {
            regs: [0; 256],
            write_log: Vec::new(),
            rx_counts: Vec::new(),
            rx_stream: Vec::new(),
            rx_cursor: 0,
            dummy_pending: false,
            tx_bursts: Vec::new(),
            chained_reads: 0,
            framed_reads: Vec::new(),
            fast_reads: Vec::new(),
            fifo_read_lens: Vec::new(),
            fail_next: 0,
            fail_fifo_read: false,
        }
    }

    fn inject(&mut self) -> Result<(), MockBusError> {
        if self.fail_next > 0 {
            self.fail_next -= 1;
            return Err(MockBusError);
        }
        Ok(())
    }

    fn reg16(&self, reg: u8) -> u16 {
        let addr = reg as usize & !1;
        u16::from_le_bytes([self.regs[addr], self.regs[addr + 1]])
    }

    /// Address of the lowest enabled lane
    fn lane_address(cmd: u16) -> u8 {
        let (base, be) = decode_command(cmd);
        base + be.trailing_zeros() as u8
    }

    fn write_reg(&mut self, cmd: u16, value: u16, bytes: usize) {
        let addr = Self::lane_address(cmd);
        let value = if bytes == 1 { value & 0xFF } else { value };
        self.write_log.push((addr, value));

        match addr {
            ISR => {
                let pending = self.reg16(ISR) & !value;
                self.store(ISR, pending, 2);
            }
            RXQCR => {
                self.dummy_pending = value & rxqcr::SDA != 0;
                if value & rxqcr::RRXEF != 0 {
                    self.release_rx();
                }
                self.store(RXQCR, value & !rxqcr::RRXEF, 2);
            }
            _ => self.store(addr, value, bytes),
        }
    }

    fn store(&mut self, addr: u8, value: u16, bytes: usize) {
        let [lo, hi] = value.to_le_bytes();
        self.regs[addr as usize] = lo;
        if bytes == 2 {
            self.regs[addr as usize + 1] = hi;
        }
    }

    fn read_reg(&self, cmd: u16, bytes: usize) -> u16 {
        let addr = Self::lane_address(cmd) as usize;
        if bytes == 1 {
            self.regs[addr] as u16
        } else {
            u16::from_le_bytes([self.regs[addr], self.regs[addr + 1]])
        }
    }

    fn release_rx(&mut self) {
        self.rx_stream.drain(..self.rx_cursor.min(self.rx_stream.len()));
        self.rx_cursor = 0;
        self.rx_counts.clear();
        self.regs[RXFC as usize] = 0;
    }

    fn fast_word(&mut self, word: u32, chain_index: Option<usize>) -> u32 {
        let [c0, c1, v0, v1] = word.to_be_bytes();
        let cmd = u16::from_le_bytes([c0, c1]);
        if cmd & 0xC0 == SPIOP_WR {
            self.write_reg(cmd, u16::from_le_bytes([v0, v1]), 2);
            return 0;
        }
        debug_assert_eq!(cmd & 0xC0, SPIOP_RD);
        let value = match chain_index {
            Some(i) if Self::lane_address(cmd) == RXFHBCR => {
                self.rx_counts.get(i).copied().unwrap_or(0)
            }
            _ => self.read_reg(cmd, 2),
        };
        let [r0, r1] = value.to_le_bytes();
        u32::from_be_bytes([0, 0, r0, r1])
    }
}

/// Simulated KS8851 behind the [`SpiBus`] seam
///
/// Clones share one register file so a test can keep a handle while the
/// driver owns the bus.
#[derive(Debug, Clone)]
pub struct MockChip {
    model: Rc<RefCell<ChipModel>>,
}

impl Default for MockChip {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChip {
    /// Blank register file
    pub fn new() -> Self {
        Self {
            model: Rc::new(RefCell::new(ChipModel::new())),
        }
    }

    /// Chip that answers the identity poll and passes its self-test
    pub fn ks8851() -> Self {
        let chip = Self::new();
        chip.set_reg16(CIDER, cider::ID | (1 << cider::REV_SHIFT));
        chip.set_reg16(MBIR, mbir::TXMBF | mbir::RXMBF);
        chip.set_reg16(TXMIR, 0x1800);
        chip
    }

    pub fn reg16(&self, reg: u8) -> u16 {
        self.model.borrow().reg16(reg)
    }

    pub fn set_reg16(&self, reg: u8, value: u16) {
        self.model.borrow_mut().store(reg & !1, value, 2);
    }

    pub fn reg8(&self, reg: u8) -> u8 {
        self.model.borrow().regs[reg as usize]
    }

    pub fn set_reg8(&self, reg: u8, value: u8) {
        self.model.borrow_mut().regs[reg as usize] = value;
    }

    /// Make the next `n` bus operations fail
    pub fn fail_next(&self, n: u32) {
        self.model.borrow_mut().fail_next = n;
    }

    /// Make the next RX FIFO read fail
    pub fn fail_next_fifo_read(&self) {
        self.model.borrow_mut().fail_fifo_read = true;
    }

    /// Every value written to `reg`, in order
    pub fn writes_to(&self, reg: u8) -> Vec<u16> {
        self.model
            .borrow()
            .write_log
            .iter()
            .filter(|(addr, _)| *addr == reg)
            .map(|(_, value)| *value)
            .collect()
    }

    pub fn write_log(&self) -> Vec<(u8, u16)> {
        self.model.borrow().write_log.clone()
    }

    pub fn clear_log(&self) {
        self.model.borrow_mut().write_log.clear();
    }

    // =========================================================================
    // RX FIFO
    // =========================================================================

    /// Queue a received frame; `payload` is what the driver should deliver
    ///
    /// The frame is stored with its status/count envelope, a four byte FCS
    /// and padding to a 4-byte boundary. The byte count register and the
    /// frame count are updated to match.
    pub fn push_rx_frame(&self, payload: &[u8]) {
        let count = (payload.len() + 4) as u16;
        let mut model = self.model.borrow_mut();
        model.rx_stream.extend_from_slice(&[0x00, 0x80]);
        model.rx_stream.extend_from_slice(&count.to_le_bytes());
        model.rx_stream.extend_from_slice(payload);
        model.rx_stream.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        let pad = align4(count as usize) - count as usize;
        model.rx_stream.extend(core::iter::repeat_n(0u8, pad));
        model.rx_counts.push(count);
        model.regs[RXFC as usize] = model.regs[RXFC as usize].wrapping_add(1);
    }

    /// Override the frame count register
    pub fn set_rx_frame_count(&self, frames: u8) {
        self.set_reg8(RXFC, frames);
    }

    /// Override the replies of the chained byte count probe
    pub fn set_rx_byte_counts(&self, counts: &[u16]) {
        self.model.borrow_mut().rx_counts = counts.to_vec();
    }

    /// Bytes still queued in the RX FIFO
    pub fn rx_pending(&self) -> usize {
        let model = self.model.borrow();
        model.rx_stream.len() - model.rx_cursor.min(model.rx_stream.len())
    }

    pub fn chained_reads(&self) -> usize {
        self.model.borrow().chained_reads
    }

    /// Registers read with 8-bit framing, in order
    pub fn framed_reads(&self) -> Vec<u8> {
        self.model.borrow().framed_reads.clone()
    }

    /// Registers read through the 32-bit fast path, in order
    pub fn fast_reads(&self) -> Vec<u8> {
        self.model.borrow().fast_reads.clone()
    }

    /// Length in bytes of every FIFO read
    pub fn fifo_read_lens(&self) -> Vec<usize> {
        self.model.borrow().fifo_read_lens.clone()
    }

    // =========================================================================
    // TX FIFO
    // =========================================================================

    /// Wire bytes of every TX FIFO burst
    pub fn tx_bursts(&self) -> Vec<Vec<u8>> {
        self.model.borrow().tx_bursts.clone()
    }

    // =========================================================================
    // Interrupts
    // =========================================================================

    pub fn raise_irq(&self, bits: u16) {
        let pending = self.reg16(ISR) | bits;
        self.set_reg16(ISR, pending);
    }
}

impl SpiBus for MockChip {
    type Error = MockBusError;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        model.inject()?;
        let cmd = u16::from_le_bytes([bytes[0], bytes[1]]);
        assert_eq!(cmd & 0xC0, SPIOP_WR, "write without write opcode");
        match bytes.len() {
            3 => model.write_reg(cmd, bytes[2] as u16, 1),
            4 => model.write_reg(cmd, u16::from_le_bytes([bytes[2], bytes[3]]), 2),
            n => panic!("unexpected register write length {n}"),
        }
        Ok(())
    }

    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        model.inject()?;
        let cmd = u16::from_le_bytes([buf[0], buf[1]]);
        assert_eq!(cmd & 0xC0, SPIOP_RD, "transfer without read opcode");
        let addr = ChipModel::lane_address(cmd);
        model.framed_reads.push(addr);
        let value = model.read_reg(cmd, buf.len() - 2);
        let [lo, hi] = value.to_le_bytes();
        buf[0] = 0;
        buf[1] = 0;
        buf[2] = lo;
        if buf.len() == 4 {
            buf[3] = hi;
        }
        Ok(())
    }

    fn transfer_word(&mut self, word: u32) -> Result<u32, Self::Error> {
        let mut model = self.model.borrow_mut();
        model.inject()?;
        let [c0, c1, _, _] = word.to_be_bytes();
        let cmd = u16::from_le_bytes([c0, c1]);
        if cmd & 0xC0 == SPIOP_RD {
            model.fast_reads.push(ChipModel::lane_address(cmd));
        }
        Ok(model.fast_word(word, None))
    }

    fn transfer_word_chain(&mut self, tx: u32, rx: &mut [u32]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        model.inject()?;
        model.chained_reads += 1;
        for (i, slot) in rx.iter_mut().enumerate() {
            *slot = model.fast_word(tx, Some(i));
        }
        Ok(())
    }

    fn read_fifo(&mut self, opcode: u8, rx: &mut [u32]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        model.inject()?;
        assert_eq!(opcode, crate::hal::spi::SPIOP_RXFIFO);
        model.fifo_read_lens.push(rx.len() * 4);
        if core::mem::take(&mut model.fail_fifo_read) {
            return Err(MockBusError);
        }

        let mut bytes = vec![0u8; rx.len() * 4];
        let mut offset = 0;
        if model.dummy_pending {
            model.dummy_pending = false;
            offset = 4.min(bytes.len());
        }
        for byte in bytes[offset..].iter_mut() {
            let cursor = model.rx_cursor;
            *byte = model.rx_stream.get(cursor).copied().unwrap_or(0);
            model.rx_cursor += 1;
        }
        for (word, chunk) in rx.iter_mut().zip(bytes.chunks_exact(4)) {
            *word = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        Ok(())
    }

    fn write_fifo(&mut self, opcode: u8, tx: &mut [u32]) -> Result<(), Self::Error> {
        let mut model = self.model.borrow_mut();
        model.inject()?;
        assert_eq!(opcode, crate::hal::spi::SPIOP_TXFIFO);
        let bytes = tx.iter().flat_map(|word| word.to_be_bytes()).collect();
        model.tx_bursts.push(bytes);
        Ok(())
    }
}

// =============================================================================
// Mock Delay
// =============================================================================

/// Delay provider that only accumulates the requested time
#[derive(Debug, Clone, Default)]
pub struct MockDelay {
    total_ns: Rc<Cell<u64>>,
}

impl MockDelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total requested delay in nanoseconds
    pub fn total_ns(&self) -> u64 {
        self.total_ns.get()
    }

    /// Total requested delay in milliseconds
    pub fn total_ms(&self) -> u64 {
        self.total_ns.get() / 1_000_000
    }
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns.set(self.total_ns.get() + ns as u64);
    }
}

// =============================================================================
// Recording Uplink
// =============================================================================

/// Uplink that records everything the driver hands it
#[derive(Debug, Default)]
pub struct RecordingUplink {
    pub frames: Vec<Vec<u8>>,
    pub timestamps: Vec<Timestamp>,
    pub wakes: usize,
    pub links: Vec<LinkState>,
    pub clock: u64,
}

impl RecordingUplink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frame_lens(&self) -> Vec<usize> {
        self.frames.iter().map(Vec::len).collect()
    }
}

impl Uplink for RecordingUplink {
    fn receive(&mut self, frame: &[u8], timestamp: Timestamp) {
        self.frames.push(frame.to_vec());
        self.timestamps.push(timestamp);
    }

    fn wake_tx(&mut self) {
        self.wakes += 1;
    }

    fn link_changed(&mut self, link: LinkState) {
        self.links.push(link);
    }

    fn now(&self) -> Timestamp {
        Timestamp::from_micros(self.clock)
    }
}

/// Frame payload with a recognisable byte pattern
pub fn test_frame(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}
