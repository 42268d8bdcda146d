//! Centralized Constants
//!
//! Single source of truth for the sizes, limits and default thresholds used
//! throughout the driver.
//!
//! # Note
//!
//! Register bit definitions live in [`super::register`], next to the register
//! they belong to.

// =============================================================================
// FIFO and Buffer Sizes
// =============================================================================

/// Transmit queue capacity reported by the chip after reset (6 KiB x 3)
pub const KSZ8851_TX_SPACE: u16 = 6144 * 3;

/// Largest receive bulk read, the size of the chip's RXQ
pub const MAX_RXFIFO_SIZE: usize = 12 * 1024;

/// Payload bytes packed into one transmit bulk write
pub const TX_BATCH_CAP: usize = 6144;

/// Raw transmit batch buffer size (cap plus one overflowing frame)
pub const TX_BATCH_BUFFER: usize = TX_BATCH_CAP * 2;

/// Size of the per-frame envelope in both FIFO directions
pub const FRAME_HEADER_SIZE: usize = 4;

/// Size of the transmit frame header as seen on the wire (pad + opcode + ctrl + len)
pub const TX_HEADER_SIZE: usize = 6;

/// Frame check sequence appended by the MAC
pub const CRC_SIZE: usize = 4;

/// Leading dummy bytes clocked out of the RX FIFO before the first envelope
pub const RX_DUMMY_SIZE: usize = 4;

/// MAC address length
pub const MAC_ADDR_LEN: usize = 6;

/// Standard Ethernet MTU
pub const MTU: usize = 1500;

/// Ethernet header (destination, source, ethertype)
pub const ETH_HEADER_SIZE: usize = 14;

/// Largest frame handed to or taken from a network stack (VLAN tagged, no FCS)
pub const MAX_FRAME_SIZE: usize = ETH_HEADER_SIZE + 4 + MTU;

// =============================================================================
// Timing
// =============================================================================

/// Hold time for a soft reset pulse, in milliseconds
pub const SOFT_RESET_HOLD_MS: u32 = 1;

/// Chip ID read attempts during attach
pub const CIDER_READ_MAX_ITER: u32 = 20;

/// Delay between chip ID read attempts, in milliseconds
pub const CIDER_READ_MAX_DELAY_MS: u32 = 20;

// =============================================================================
// Receive Coalescing and Flow Control Defaults
// =============================================================================

/// RX duration timer threshold in microseconds
pub const DEFAULT_RX_DURATION_US: u16 = 1000;

/// RX data byte count threshold
pub const DEFAULT_RX_BYTE_THRESHOLD: u16 = 4096;

/// RX frame count threshold
pub const DEFAULT_RX_FRAME_THRESHOLD: u8 = 10;

/// Flow control low watermark (bytes of free RXQ that end PAUSE)
pub const DEFAULT_FLOW_LOW_WATER: u16 = 0x0800;

/// Flow control high watermark (bytes of free RXQ that start PAUSE)
pub const DEFAULT_FLOW_HIGH_WATER: u16 = 0x0400;

/// Round `len` up to the next 4-byte boundary
#[inline(always)]
pub const fn align4(len: usize) -> usize {
    (len + 3) & !3
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align4_rounds_up() {
        assert_eq!(align4(0), 0);
        assert_eq!(align4(1), 4);
        assert_eq!(align4(60), 60);
        assert_eq!(align4(1499), 1500);
        assert_eq!(align4(1501), 1504);
    }

    #[test]
    fn tx_space_is_three_batches() {
        assert_eq!(KSZ8851_TX_SPACE as usize, TX_BATCH_CAP * 3);
        assert_eq!(KSZ8851_TX_SPACE, 18432);
    }

    #[test]
    fn batch_buffer_holds_cap_plus_one_frame() {
        assert!(TX_BATCH_BUFFER >= TX_BATCH_CAP + FRAME_HEADER_SIZE + align4(MTU + 18));
    }
}
