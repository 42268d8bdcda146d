//! Receive address filtering for the KS8851.
//!
//! The chip filters on three things:
//!
//! - **Station address** - the MAC address programmed into `MAR`
//! - **Multicast hash** - a 64-bit table split over four 16-bit registers
//! - **Mode bits** in `RXCR1` (promiscuous, all-multicast, broadcast)
//!
//! A [`RxFilter`] captures all of those register values. It is built from a
//! [`RxMode`] request and compared for equality against the last requested
//! filter, so identical requests never touch the chip twice.
//!
//! # Hash Filtering
//!
//! Each multicast address selects one of 64 bits: the top six bits of the
//! big-endian Ethernet CRC of the address. Bits 5:4 of the index pick the
//! bucket register, bits 3:0 the bit inside it. Collisions are possible.

use embedded_hal::delay::DelayNs;

use super::chip::Chip;
use crate::hal::spi::SpiBus;
use crate::internal::register::{MAHTR, RXCR1, RXCR2, rxcr1, rxcr2};

// =============================================================================
// Receive Mode
// =============================================================================

/// Address filtering mode requested by the network stack
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxMode<'a> {
    /// Station address and broadcast only
    Normal,
    /// Station address, broadcast, and the listed multicast groups
    Multicast(&'a [[u8; 6]]),
    /// Every multicast frame
    AllMulticast,
    /// Every frame
    Promiscuous,
}

// =============================================================================
// Receive Filter Settings
// =============================================================================

/// Register values implementing a receive filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxFilter {
    /// Multicast hash buckets for `MAHTR0..=MAHTR3`
    pub mchash: [u16; 4],
    /// `RXCR1` value
    pub rxcr1: u16,
    /// `RXCR2` value
    pub rxcr2: u16,
}

impl RxFilter {
    /// Bits set in every filter that leaves the receiver running
    pub const ENABLE: u16 = rxcr1::RXUE | rxcr1::RXBE | rxcr1::RXE | rxcr1::RXFCE;

    /// Build the filter for `mode`
    pub fn from_mode(mode: RxMode<'_>) -> Self {
        let mut filter = Self::default();

        let mode_bits = match mode {
            RxMode::Promiscuous => rxcr1::RXAE | rxcr1::RXINVF,
            RxMode::AllMulticast => {
                rxcr1::RXME | rxcr1::RXAE | rxcr1::RXPAFMA | rxcr1::RXMAFMA
            }
            RxMode::Multicast(groups) if !groups.is_empty() => {
                for addr in groups {
                    filter.add_hash(addr);
                }
                rxcr1::RXME | rxcr1::RXPAFMA
            }
            RxMode::Multicast(_) | RxMode::Normal => rxcr1::RXPAFMA,
        };

        filter.rxcr1 = mode_bits | Self::ENABLE;
        filter.rxcr2 = rxcr2::SRDBL_FRAME;
        filter
    }

    /// Set the hash bit for `addr`, returning its index (0-63)
    pub fn add_hash(&mut self, addr: &[u8; 6]) -> u8 {
        let index = hash_index(addr);
        self.mchash[(index >> 4) as usize] |= 1 << (index & 0xF);
        index
    }

    /// Check whether `addr` would pass the hash table
    pub fn hash_matches(&self, addr: &[u8; 6]) -> bool {
        let index = hash_index(addr);
        self.mchash[(index >> 4) as usize] & (1 << (index & 0xF)) != 0
    }

    /// Whether writing this filter leaves the receive process running
    pub const fn enables_receiver(&self) -> bool {
        self.rxcr1 & rxcr1::RXE != 0
    }

    /// Whether the filter accepts every frame
    pub fn is_promiscuous(&self) -> bool {
        self.rxcr1 & rxcr1::RXINVF != 0
    }
}

// =============================================================================
// Register Programming
// =============================================================================

impl<B: SpiBus, D: DelayNs> Chip<B, D> {
    /// Stop the receive process so the filter registers can be rewritten
    ///
    /// The chip answers with a receive-process-stopped interrupt.
    pub fn quiesce_receiver(&mut self) {
        self.regs.write16(RXCR1, 0);
    }

    /// Write the hash buckets, then both control words
    ///
    /// `RXCR1` goes last since it restarts the receiver.
    pub fn write_rx_filter(&mut self, filter: &RxFilter) {
        for (reg, bucket) in MAHTR.iter().zip(filter.mchash) {
            self.regs.write16(*reg, bucket);
        }
        self.regs.write16(RXCR2, filter.rxcr2);
        self.regs.write16(RXCR1, filter.rxcr1);
    }
}

// =============================================================================
// CRC
// =============================================================================

/// Big-endian Ethernet CRC-32 of `data`
///
/// Bits are consumed least significant first, shifted into the top of the
/// register. No final inversion.
pub fn ether_crc(data: &[u8]) -> u32 {
    const POLY: u32 = 0x04C1_1DB7;
    let mut crc: u32 = 0xFFFF_FFFF;

    for byte in data {
        let mut octet = *byte;
        for _ in 0..8 {
            let feedback = ((crc >> 31) ^ (octet as u32 & 1)) != 0;
            crc <<= 1;
            if feedback {
                crc ^= POLY;
            }
            octet >>= 1;
        }
    }
    crc
}

/// Hash table index (0-63) for a multicast address
#[inline]
pub fn hash_index(addr: &[u8; 6]) -> u8 {
    (ether_crc(addr) >> 26) as u8
}

// =============================================================================
// Unit Tests
// =============================================================================
