//! Driver configuration
//!
//! [`Ks8851Config`] collects everything the driver programs into the chip
//! during attach and open. Defaults match the values the chip is normally
//! run with; most boards only need to supply a fallback MAC address.

use super::error::{ConfigError, ConfigResult};
use crate::internal::constants::{
    CIDER_READ_MAX_DELAY_MS, CIDER_READ_MAX_ITER, DEFAULT_FLOW_HIGH_WATER,
    DEFAULT_FLOW_LOW_WATER, DEFAULT_RX_BYTE_THRESHOLD, DEFAULT_RX_DURATION_US,
    DEFAULT_RX_FRAME_THRESHOLD, KSZ8851_TX_SPACE, SOFT_RESET_HOLD_MS,
};

// =============================================================================
// MAC Address Helpers
// =============================================================================

/// Whether `addr` can be used as a station address
///
/// Rejects all-zero and multicast (including broadcast) addresses.
#[inline]
pub const fn is_valid_mac_address(addr: &[u8; 6]) -> bool {
    let zero = addr[0] == 0
        && addr[1] == 0
        && addr[2] == 0
        && addr[3] == 0
        && addr[4] == 0
        && addr[5] == 0;
    !zero && addr[0] & 0x01 == 0
}

// =============================================================================
// Main Configuration
// =============================================================================

/// KS8851 driver configuration
///
/// # Example
///
/// ```ignore
/// let config = Ks8851Config::new()
///     .with_mac_address([0x02, 0x00, 0x00, 0x12, 0x34, 0x56])
///     .with_rx_frame_count_threshold(4);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Ks8851Config {
    /// Station address used when the chip has no valid EEPROM address
    pub mac_address: Option<[u8; 6]>,
    /// Initial transmit space budget in bytes
    pub tx_space: u16,
    /// RX interrupt duration timer threshold (microseconds)
    pub rx_duration_timer_us: u16,
    /// RX interrupt data byte count threshold
    pub rx_byte_count_threshold: u16,
    /// RX interrupt frame count threshold
    pub rx_frame_count_threshold: u8,
    /// Flow control low watermark (`FCLWR`)
    pub flow_low_watermark: u16,
    /// Flow control high watermark (`FCHWR`)
    pub flow_high_watermark: u16,
    /// Chip ID read attempts during attach
    pub chip_id_attempts: u32,
    /// Delay between chip ID attempts in milliseconds
    pub chip_id_retry_delay_ms: u32,
    /// Hold time on each edge of a soft reset in milliseconds
    pub reset_hold_ms: u32,
}

impl Default for Ks8851Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Ks8851Config {
    /// Create a new configuration with defaults
    #[must_use]
    pub const fn new() -> Self {
        Self {
            mac_address: None,
            tx_space: KSZ8851_TX_SPACE,
            rx_duration_timer_us: DEFAULT_RX_DURATION_US,
            rx_byte_count_threshold: DEFAULT_RX_BYTE_THRESHOLD,
            rx_frame_count_threshold: DEFAULT_RX_FRAME_THRESHOLD,
            flow_low_watermark: DEFAULT_FLOW_LOW_WATER,
            flow_high_watermark: DEFAULT_FLOW_HIGH_WATER,
            chip_id_attempts: CIDER_READ_MAX_ITER,
            chip_id_retry_delay_ms: CIDER_READ_MAX_DELAY_MS,
            reset_hold_ms: SOFT_RESET_HOLD_MS,
        }
    }

    // =========================================================================
    // Builder Methods
    // =========================================================================

    /// Set the fallback MAC address
    #[must_use]
    pub const fn with_mac_address(mut self, addr: [u8; 6]) -> Self {
        self.mac_address = Some(addr);
        self
    }

    /// Set the initial transmit space budget
    #[must_use]
    pub const fn with_tx_space(mut self, bytes: u16) -> Self {
        self.tx_space = bytes;
        self
    }

    /// Set the RX duration timer threshold
    #[must_use]
    pub const fn with_rx_duration_timer_us(mut self, us: u16) -> Self {
        self.rx_duration_timer_us = us;
        self
    }

    /// Set the RX byte count threshold
    #[must_use]
    pub const fn with_rx_byte_count_threshold(mut self, bytes: u16) -> Self {
        self.rx_byte_count_threshold = bytes;
        self
    }

    /// Set the RX frame count threshold
    #[must_use]
    pub const fn with_rx_frame_count_threshold(mut self, frames: u8) -> Self {
        self.rx_frame_count_threshold = frames;
        self
    }

    /// Set both flow control watermarks
    #[must_use]
    pub const fn with_flow_watermarks(mut self, low: u16, high: u16) -> Self {
        self.flow_low_watermark = low;
        self.flow_high_watermark = high;
        self
    }

    /// Set the chip ID poll budget
    #[must_use]
    pub const fn with_chip_id_poll(mut self, attempts: u32, delay_ms: u32) -> Self {
        self.chip_id_attempts = attempts;
        self.chip_id_retry_delay_ms = delay_ms;
        self
    }

    /// Set the soft reset hold time
    #[must_use]
    pub const fn with_reset_hold_ms(mut self, ms: u32) -> Self {
        self.reset_hold_ms = ms;
        self
    }

    /// Check the configuration for values the driver cannot run with
    pub fn validate(&self) -> ConfigResult<()> {
        if self.tx_space == 0 || self.chip_id_attempts == 0 {
            return Err(ConfigError::InvalidConfig);
        }
        if let Some(addr) = &self.mac_address
            && !is_valid_mac_address(addr)
        {
            return Err(ConfigError::InvalidMacAddress);
        }
        Ok(())
    }
}

// =============================================================================
// Driver State
// =============================================================================

/// Interface state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum State {
    /// Attached, never opened
    #[default]
    Initialized,
    /// TX and RX enabled, interrupts unmasked
    Running,
    /// Closed after running
    Stopped,
}

impl State {
    /// Whether the interface is open
    pub const fn is_open(self) -> bool {
        matches!(self, State::Running)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
