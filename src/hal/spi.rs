//! SPI bus transaction layer
//!
//! Every register and FIFO access to the KS8851 is one synchronous SPI
//! exchange. Register accesses start with a 16-bit command sent low byte
//! first:
//!
//! ```text
//!  15        10   9   8   7    6   5         2   1       0
//! +------------+-------+--------+-------------+----------+
//! |  reg[5:0]  |   0   | opcode | byte enable | reg[7:6] |
//! +------------+-------+--------+-------------+----------+
//! ```
//!
//! FIFO accesses start with a single opcode byte followed by 32-bit data
//! words. 32-bit words are shifted out most significant byte first, so the
//! first wire byte of a word is its top byte. Callers working with the
//! little-endian register layout must swap before sending and after
//! receiving on that path; [`RegisterBus`] does this for the fast register
//! read.
//!
//! Failures never propagate from this layer. A failed exchange is logged,
//! counted in [`BusStats`], and a read returns zero.

use alloc::vec::Vec;

use embedded_hal::spi::{Operation, SpiDevice};

// =============================================================================
// Opcodes
// =============================================================================

/// Register read opcode
pub const SPIOP_RD: u16 = 0x00;
/// Register write opcode
pub const SPIOP_WR: u16 = 0x40;
/// RX FIFO read opcode
pub const SPIOP_RXFIFO: u8 = 0x80;
/// TX FIFO write opcode
pub const SPIOP_TXFIFO: u8 = 0xC0;

// =============================================================================
// Command Encoding
// =============================================================================

/// Register access width
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AccessWidth {
    /// Single byte lane
    Bits8,
    /// Two byte lanes, 8-bit SPI framing
    Bits16,
    /// Two byte lanes carried in one 32-bit SPI word (fast path)
    Bits32,
}

/// Byte lanes addressed by an access to `reg`
///
/// 8-bit accesses select `1 << (reg & 3)`; 16-bit and 32-bit accesses select
/// the upper or lower lane pair depending on `reg & 2`.
#[inline]
pub const fn byte_enable(reg: u8, width: AccessWidth) -> u16 {
    match width {
        AccessWidth::Bits8 => 1 << (reg & 3),
        AccessWidth::Bits16 | AccessWidth::Bits32 => {
            if reg & 2 != 0 {
                0xC
            } else {
                0x3
            }
        }
    }
}

/// Command word for a register access, without opcode
#[inline]
pub const fn command_word(reg: u8, width: AccessWidth) -> u16 {
    let reg = reg as u16;
    (byte_enable(reg as u8, width) << 2) | (reg << 10) | (reg >> 6)
}

/// Register addressed by a command word (inverse of [`command_word`])
///
/// Returns the base address of the 32-bit lane group and the byte enable.
#[inline]
pub const fn decode_command(cmd: u16) -> (u8, u8) {
    let reg = (((cmd & 0x3) << 6) | ((cmd >> 10) & 0x3C)) as u8;
    let be = ((cmd >> 2) & 0xF) as u8;
    (reg, be)
}

/// Swap a command into the 32-bit word that puts its low byte on the wire first
#[inline]
pub const fn fast_command(cmd: u16) -> u32 {
    (cmd as u32).swap_bytes()
}

/// Extract the 16-bit register value from a 32-bit fast-path reply
#[inline]
pub const fn fast_reply(word: u32) -> u16 {
    (word as u16).swap_bytes()
}

// =============================================================================
// Bus Trait
// =============================================================================

/// Raw SPI operations needed by the driver
///
/// This is the hardware seam. Each method is one chip-select frame except
/// [`SpiBus::transfer_word_chain`], which issues one frame per word inside a
/// single message.
pub trait SpiBus {
    /// Bus error type
    type Error: core::fmt::Debug;

    /// Write bytes with 8-bit framing
    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error>;

    /// Full-duplex exchange with 8-bit framing, replacing `buf` with the reply
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Exchange one 32-bit word
    fn transfer_word(&mut self, word: u32) -> Result<u32, Self::Error>;

    /// Send `tx` once per element of `rx`, toggling chip select between words
    fn transfer_word_chain(&mut self, tx: u32, rx: &mut [u32]) -> Result<(), Self::Error>;

    /// Send `opcode`, then clock in `rx.len()` 32-bit words in the same frame
    fn read_fifo(&mut self, opcode: u8, rx: &mut [u32]) -> Result<(), Self::Error>;

    /// Send `opcode`, then `tx` as 32-bit words in the same frame
    ///
    /// Implementations may reorder bytes in place while sending but must
    /// restore `tx` before returning.
    fn write_fifo(&mut self, opcode: u8, tx: &mut [u32]) -> Result<(), Self::Error>;
}

// =============================================================================
// embedded-hal Adapter
// =============================================================================

/// [`SpiBus`] over any `embedded_hal::spi::SpiDevice`
///
/// 32-bit words are expressed as big-endian byte quadruples. Chained reads
/// are issued as one transaction per word because `SpiDevice` keeps chip
/// select asserted for the whole of a transaction.
#[derive(Debug)]
pub struct SpiDeviceBus<D> {
    device: D,
}

impl<D> SpiDeviceBus<D> {
    /// Wrap an SPI device
    pub const fn new(device: D) -> Self {
        Self { device }
    }

    /// Return the wrapped device
    pub fn release(self) -> D {
        self.device
    }
}

impl<D: SpiDevice<u8>> SpiBus for SpiDeviceBus<D> {
    type Error = D::Error;

    fn write(&mut self, bytes: &[u8]) -> Result<(), Self::Error> {
        self.device.write(bytes)
    }

    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.device.transfer_in_place(buf)
    }

    fn transfer_word(&mut self, word: u32) -> Result<u32, Self::Error> {
        let mut bytes = word.to_be_bytes();
        self.device.transfer_in_place(&mut bytes)?;
        Ok(u32::from_be_bytes(bytes))
    }

    fn transfer_word_chain(&mut self, tx: u32, rx: &mut [u32]) -> Result<(), Self::Error> {
        for slot in rx.iter_mut() {
            *slot = self.transfer_word(tx)?;
        }
        Ok(())
    }

    fn read_fifo(&mut self, opcode: u8, rx: &mut [u32]) -> Result<(), Self::Error> {
        self.device.transaction(&mut [
            Operation::Write(&[opcode]),
            Operation::Read(bytemuck::cast_slice_mut(rx)),
        ])?;
        for word in rx.iter_mut() {
            *word = u32::from_be(*word);
        }
        Ok(())
    }

    fn write_fifo(&mut self, opcode: u8, tx: &mut [u32]) -> Result<(), Self::Error> {
        for word in tx.iter_mut() {
            *word = word.to_be();
        }
        let result = self.device.transaction(&mut [
            Operation::Write(&[opcode]),
            Operation::Write(bytemuck::cast_slice(tx)),
        ]);
        for word in tx.iter_mut() {
            *word = u32::from_be(*word);
        }
        result
    }
}

// =============================================================================
// Register Bus
// =============================================================================

/// Exchange counters kept by [`RegisterBus`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusStats {
    /// Exchanges issued
    pub exchanges: u32,
    /// Exchanges that reported an error
    pub faults: u32,
}

/// Register and FIFO access over a [`SpiBus`]
///
/// Owns the bus. All methods are best effort: errors are logged and
/// counted, and reads fall back to zero.
#[derive(Debug)]
pub struct RegisterBus<B> {
    bus: B,
    stats: BusStats,
}

impl<B: SpiBus> RegisterBus<B> {
    /// Wrap a bus
    pub const fn new(bus: B) -> Self {
        Self {
            bus,
            stats: BusStats {
                exchanges: 0,
                faults: 0,
            },
        }
    }

    /// Exchange counters
    pub fn stats(&self) -> BusStats {
        self.stats
    }

    /// Return the underlying bus
    pub fn release(self) -> B {
        self.bus
    }

    fn check<T>(&mut self, result: Result<T, B::Error>, _what: &'static str) -> Option<T> {
        self.stats.exchanges = self.stats.exchanges.wrapping_add(1);
        match result {
            Ok(value) => Some(value),
            Err(_) => {
                self.stats.faults = self.stats.faults.wrapping_add(1);
                #[cfg(feature = "defmt")]
                defmt::error!("spi: {} failed", _what);
                None
            }
        }
    }

    /// Write `value` to `reg`
    ///
    /// 8-bit writes send three bytes (command, value); 16-bit writes send
    /// four. A 32-bit write packs command and value into one fast-path word.
    pub fn write(&mut self, reg: u8, value: u16, width: AccessWidth) {
        let cmd = command_word(reg, width) | SPIOP_WR;
        let [c0, c1] = cmd.to_le_bytes();
        let [v0, v1] = value.to_le_bytes();
        let result = match width {
            AccessWidth::Bits8 => self.bus.write(&[c0, c1, v0]),
            AccessWidth::Bits16 => self.bus.write(&[c0, c1, v0, v1]),
            AccessWidth::Bits32 => self
                .bus
                .transfer_word(u32::from_be_bytes([c0, c1, v0, v1]))
                .map(|_| ()),
        };
        self.check(result, "register write");
    }

    /// Read `reg`, returning zero if the exchange fails
    pub fn read(&mut self, reg: u8, width: AccessWidth) -> u16 {
        let cmd = command_word(reg, width) | SPIOP_RD;
        let [c0, c1] = cmd.to_le_bytes();
        match width {
            AccessWidth::Bits8 => {
                let mut buf = [c0, c1, 0];
                let result = self.bus.transfer(&mut buf);
                self.check(result, "register read")
                    .map_or(0, |()| buf[2] as u16)
            }
            AccessWidth::Bits16 => {
                let mut buf = [c0, c1, 0, 0];
                let result = self.bus.transfer(&mut buf);
                self.check(result, "register read")
                    .map_or(0, |()| u16::from_le_bytes([buf[2], buf[3]]))
            }
            AccessWidth::Bits32 => {
                let result = self.bus.transfer_word(fast_command(cmd));
                self.check(result, "fast register read").map_or(0, fast_reply)
            }
        }
    }

    /// Write an 8-bit register lane
    #[inline]
    pub fn write8(&mut self, reg: u8, value: u8) {
        self.write(reg, value as u16, AccessWidth::Bits8);
    }

    /// Write a 16-bit register
    #[inline]
    pub fn write16(&mut self, reg: u8, value: u16) {
        self.write(reg, value, AccessWidth::Bits16);
    }

    /// Read an 8-bit register lane
    #[inline]
    pub fn read8(&mut self, reg: u8) -> u8 {
        self.read(reg, AccessWidth::Bits8) as u8
    }

    /// Read a 16-bit register with 8-bit framing
    #[inline]
    pub fn read16(&mut self, reg: u8) -> u16 {
        self.read(reg, AccessWidth::Bits16)
    }

    /// Read a 16-bit register through the 32-bit fast path
    #[inline]
    pub fn read32(&mut self, reg: u8) -> u16 {
        self.read(reg, AccessWidth::Bits32)
    }

    /// Read `reg` once per element of `out` in one chained message
    ///
    /// On failure every element reads as zero.
    pub fn read_chained(&mut self, reg: u8, out: &mut [u16]) -> crate::BufferResult<()> {
        let mut words: Vec<u32> = Vec::new();
        words.try_reserve_exact(out.len())?;
        words.resize(out.len(), 0);

        let cmd = fast_command(command_word(reg, AccessWidth::Bits32) | SPIOP_RD);
        let result = self.bus.transfer_word_chain(cmd, &mut words);
        let ok = self.check(result, "chained read").is_some();
        for (value, word) in out.iter_mut().zip(words.iter()) {
            *value = if ok { fast_reply(*word) } else { 0 };
        }
        Ok(())
    }

    /// Bulk FIFO read into `words`; zero-filled on failure
    pub fn read_bulk(&mut self, opcode: u8, words: &mut [u32]) {
        let result = self.bus.read_fifo(opcode, words);
        if self.check(result, "fifo read").is_none() {
            words.fill(0);
        }
    }

    /// Bulk FIFO write of `words`
    pub fn write_bulk(&mut self, opcode: u8, words: &mut [u32]) {
        let result = self.bus.write_fifo(opcode, words);
        self.check(result, "fifo write");
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
