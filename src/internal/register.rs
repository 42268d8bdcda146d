//! KS8851 register map
//!
//! Register offsets are byte addresses in the chip's 256-byte register space.
//! Most registers are 16 bits wide and live on even offsets; a few are read
//! through 8-bit lanes (`RXFC`, `MAR`).
//!
//! Bit definitions follow the offset of the register they belong to, grouped
//! into one module per register.

// Allow unused constants - these are complete register definitions for reference
#![allow(dead_code)]

// =============================================================================
// Register Offsets
// =============================================================================

/// Chip Configuration Register
pub const CCR: u8 = 0x08;
/// MAC Address Register Low (bytes 4..5)
pub const MARL: u8 = 0x10;
/// MAC Address Register Middle (bytes 2..3)
pub const MARM: u8 = 0x12;
/// MAC Address Register High (bytes 0..1)
pub const MARH: u8 = 0x14;
/// On-chip Bus Control Register
pub const OBCR: u8 = 0x20;
/// EEPROM Control Register
pub const EEPCR: u8 = 0x22;
/// Memory BIST Info Register
pub const MBIR: u8 = 0x24;
/// Global Reset Register
pub const GRR: u8 = 0x26;
/// Transmit Control Register
pub const TXCR: u8 = 0x70;
/// Transmit Status Register
pub const TXSR: u8 = 0x72;
/// Receive Control Register 1
pub const RXCR1: u8 = 0x74;
/// Receive Control Register 2
pub const RXCR2: u8 = 0x76;
/// TXQ Memory Information Register
pub const TXMIR: u8 = 0x78;
/// Receive Frame Header Status Register
pub const RXFHSR: u8 = 0x7C;
/// Receive Frame Header Byte Count Register
pub const RXFHBCR: u8 = 0x7E;
/// TXQ Command Register
pub const TXQCR: u8 = 0x80;
/// RXQ Command Register
pub const RXQCR: u8 = 0x82;
/// TX Frame Data Pointer Register
pub const TXFDPR: u8 = 0x84;
/// RX Frame Data Pointer Register
pub const RXFDPR: u8 = 0x86;
/// RX Duration Timer Threshold Register
pub const RXDTTR: u8 = 0x8C;
/// RX Data Byte Count Threshold Register
pub const RXDBCTR: u8 = 0x8E;
/// Interrupt Enable Register
pub const IER: u8 = 0x90;
/// Interrupt Status Register
pub const ISR: u8 = 0x92;
/// RX Frame Count and Threshold Register
pub const RXFCTR: u8 = 0x9C;
/// RX frame count, upper byte of `RXFCTR` (8-bit access)
pub const RXFC: u8 = 0x9D;
/// MAC Address Hash Table Register 0
pub const MAHTR0: u8 = 0xA0;
/// MAC Address Hash Table Register 1
pub const MAHTR1: u8 = 0xA2;
/// MAC Address Hash Table Register 2
pub const MAHTR2: u8 = 0xA4;
/// MAC Address Hash Table Register 3
pub const MAHTR3: u8 = 0xA6;
/// Flow Control Low Watermark Register
pub const FCLWR: u8 = 0xB0;
/// Flow Control High Watermark Register
pub const FCHWR: u8 = 0xB2;
/// Chip ID and Enable Register
pub const CIDER: u8 = 0xC0;
/// Power Management Event Control Register
pub const PMECR: u8 = 0xD4;
/// Port 1 MII Basic Control Register
pub const P1MBCR: u8 = 0xE4;
/// Port 1 MII Basic Status Register
pub const P1MBSR: u8 = 0xE6;
/// PHY 1 PHY ID Low Register
pub const PHY1ILR: u8 = 0xE8;
/// PHY 1 PHY ID High Register
pub const PHY1IHR: u8 = 0xEA;
/// Port 1 Auto-Negotiation Advertisement Register
pub const P1ANAR: u8 = 0xEC;
/// Port 1 Auto-Negotiation Link Partner Ability Register
pub const P1ANLPR: u8 = 0xEE;
/// Port 1 Status Register
pub const P1SR: u8 = 0xF8;

/// Multicast hash table registers, in bucket order
pub const MAHTR: [u8; 4] = [MAHTR0, MAHTR1, MAHTR2, MAHTR3];

/// 8-bit MAC address lane for address byte `i` (byte 0 is the most significant)
#[inline(always)]
pub const fn mar(i: usize) -> u8 {
    0x15 - i as u8
}

// =============================================================================
// Bit Definitions
// =============================================================================

/// CCR (Chip Configuration Register) bits
pub mod ccr {
    /// External EEPROM present
    pub const EEPROM: u16 = 1 << 9;
    /// SPI bus mode
    pub const SPI: u16 = 1 << 8;
    /// 32-bit bus mode
    pub const BUS_32BIT: u16 = 1 << 2;
}

/// EEPCR (EEPROM Control Register) bits
pub mod eepcr {
    /// Software EEPROM access enable
    pub const EESA: u16 = 1 << 4;
    /// EEPROM data in
    pub const EESB: u16 = 1 << 3;
    /// EEPROM data out / clock / chip select
    pub const EECB_MASK: u16 = 0x7;
}

/// MBIR (Memory BIST Info Register) bits
pub mod mbir {
    /// TX memory self-test finished
    pub const TXMBF: u16 = 1 << 12;
    /// TX memory self-test failed
    pub const TXMBFA: u16 = 1 << 11;
    /// RX memory self-test finished
    pub const RXMBF: u16 = 1 << 4;
    /// RX memory self-test failed
    pub const RXMBFA: u16 = 1 << 3;
}

/// GRR (Global Reset Register) bits
pub mod grr {
    /// QMU soft reset (clears TXQ and RXQ)
    pub const QMU: u16 = 1 << 1;
    /// Global soft reset
    pub const GSR: u16 = 1 << 0;
}

/// TXCR (Transmit Control Register) bits
pub mod txcr {
    /// Flush transmit queue
    pub const FTXQ: u16 = 1 << 4;
    /// Transmit flow control enable
    pub const TXFCE: u16 = 1 << 3;
    /// Transmit padding enable
    pub const TXPE: u16 = 1 << 2;
    /// Transmit CRC enable
    pub const TXCRC: u16 = 1 << 1;
    /// Transmit enable
    pub const TXE: u16 = 1 << 0;
}

/// RXCR1 (Receive Control Register 1) bits
pub mod rxcr1 {
    /// Flush receive queue
    pub const FRXQ: u16 = 1 << 15;
    /// Physical address filtering with MAC address
    pub const RXPAFMA: u16 = 1 << 11;
    /// Receive flow control enable
    pub const RXFCE: u16 = 1 << 10;
    /// Receive error frames
    pub const RXEFE: u16 = 1 << 9;
    /// Multicast address filtering with MAC address (hash table)
    pub const RXMAFMA: u16 = 1 << 8;
    /// Receive broadcast
    pub const RXBE: u16 = 1 << 7;
    /// Receive multicast
    pub const RXME: u16 = 1 << 6;
    /// Receive unicast
    pub const RXUE: u16 = 1 << 5;
    /// Receive all
    pub const RXAE: u16 = 1 << 4;
    /// Inverse filtering
    pub const RXINVF: u16 = 1 << 1;
    /// Receive enable
    pub const RXE: u16 = 1 << 0;
}

/// RXCR2 (Receive Control Register 2) bits
pub mod rxcr2 {
    /// SPI receive data burst length field shift
    pub const SRDBL_SHIFT: u16 = 5;
    /// Burst length: whole frame
    pub const SRDBL_FRAME: u16 = 4 << SRDBL_SHIFT;
}

/// TXMIR (TXQ Memory Information Register) fields
pub mod txmir {
    /// Free TXQ memory in bytes
    pub const TXMA_MASK: u16 = 0x1FFF;
}

/// RXFHBCR (Receive Frame Header Byte Count Register) fields
pub mod rxfhbcr {
    /// Receive byte count, FCS included
    pub const RXBC_MASK: u16 = 0x0FFF;
}

/// TXQCR (TXQ Command Register) bits
pub mod txqcr {
    /// Auto-enqueue TXQ frame enable
    pub const AETFE: u16 = 1 << 2;
    /// TXQ memory available monitor
    pub const TXQMAM: u16 = 1 << 1;
    /// Manual enqueue TXQ frame enable
    pub const METFE: u16 = 1 << 0;
}

/// RXQCR (RXQ Command Register) bits
pub mod rxqcr {
    /// RX duration timer threshold status
    pub const RXDTTS: u16 = 1 << 12;
    /// RX data byte count threshold status
    pub const RXDBCTS: u16 = 1 << 11;
    /// RX frame count threshold status
    pub const RXFCTS: u16 = 1 << 10;
    /// RX duration timer threshold enable
    pub const RXDTTE: u16 = 1 << 7;
    /// RX data byte count threshold enable
    pub const RXDBCTE: u16 = 1 << 6;
    /// RX frame count threshold enable
    pub const RXFCTE: u16 = 1 << 5;
    /// Auto-dequeue RXQ frame enable
    pub const ADRFE: u16 = 1 << 4;
    /// Start DMA access
    pub const SDA: u16 = 1 << 3;
    /// Release RX error frame
    pub const RRXEF: u16 = 1 << 0;
}

/// TXFDPR / RXFDPR (frame data pointer) bits
pub mod fdpr {
    /// Frame data pointer auto-increment
    pub const FPAI: u16 = 1 << 14;
}

/// IER / ISR interrupt bits
pub mod irq {
    /// Link change
    pub const LCI: u16 = 1 << 15;
    /// Transmit done
    pub const TXI: u16 = 1 << 14;
    /// Receive done
    pub const RXI: u16 = 1 << 13;
    /// Receive overrun
    pub const RXOI: u16 = 1 << 11;
    /// Transmit process stopped
    pub const TXPSI: u16 = 1 << 9;
    /// Receive process stopped
    pub const RXPSI: u16 = 1 << 8;
    /// Transmit space available
    pub const TXSAI: u16 = 1 << 6;
    /// Receive wake-up frame detect
    pub const RXWFDI: u16 = 1 << 5;
    /// Receive magic packet detect
    pub const RXMPDI: u16 = 1 << 4;
    /// Linkup detect
    pub const LDI: u16 = 1 << 3;
    /// Energy detect
    pub const EDI: u16 = 1 << 2;
    /// SPI bus error
    pub const SPIBEI: u16 = 1 << 1;
    /// Delay energy detect
    pub const DEDI: u16 = 1 << 0;
}

/// CIDER (Chip ID and Enable Register) fields
pub mod cider {
    /// Family and chip ID with the revision masked out
    pub const ID: u16 = 0x8870;
    /// Revision field
    pub const REV_MASK: u16 = 0x7 << 1;
    /// Revision field shift
    pub const REV_SHIFT: u16 = 1;
}

/// PMECR (Power Management Event Control Register) fields
pub mod pmecr {
    /// Power management mode field
    pub const PM_MASK: u16 = 0x3;
    /// Normal operation
    pub const PM_NORMAL: u16 = 0;
    /// Energy detect
    pub const PM_ENERGY: u16 = 1;
    /// Soft power down
    pub const PM_SOFTDOWN: u16 = 2;
    /// Power saving
    pub const PM_POWERSAVE: u16 = 3;
    /// Wake-up event indication field
    pub const WKEVT_MASK: u16 = 0xF << 2;
    /// Wake-up event: energy
    pub const WKEVT_ENERGY: u16 = 0x1 << 2;
    /// Wake-up event: link
    pub const WKEVT_LINK: u16 = 0x2 << 2;
    /// Wake-up event: magic packet
    pub const WKEVT_MAGICPKT: u16 = 0x4 << 2;
    /// Wake-up event: frame
    pub const WKEVT_FRAME: u16 = 0x8 << 2;
}

/// P1SR (Port 1 Status Register) bits
pub mod p1sr {
    /// Operation mode: full duplex
    pub const OP_FDX: u16 = 1 << 10;
    /// Operation speed: 100 Mbps
    pub const OP_100M: u16 = 1 << 9;
    /// Link good
    pub const LINK_GOOD: u16 = 1 << 5;
}

/// Transmit frame control word bits
pub mod txfr {
    /// Raise TXI once this frame is sent
    pub const TXIC: u16 = 1 << 15;
    /// Frame ID field
    pub const TXFID_MASK: u16 = 0x1FFF;
}
